use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Source of the bearer token attached to portal requests.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<String>;

    fn store(&self, token: String);

    /// Forget the token, e.g. after the backend rejected it.
    fn clear(&self);
}

/// Tokens of every chat, optionally mirrored to a JSON file.
#[derive(Debug, Clone, Default)]
pub struct TokenVault {
    tokens: Arc<RwLock<HashMap<i64, String>>>,
    path: Option<Arc<PathBuf>>,
}

impl TokenVault {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the vault stored at `path`. A missing or unreadable file is an
    /// empty vault; users then have to log in again.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let path = path.as_ref().to_path_buf();
        let tokens = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                log::warn!("Ignoring corrupt token store {}: {}", path.display(), err);
                HashMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err),
        };
        log::info!("Loaded {} stored tokens from {}", tokens.len(), path.display());
        Ok(Self {
            tokens: Arc::new(RwLock::new(tokens)),
            path: Some(Arc::new(path)),
        })
    }

    pub fn for_chat(&self, chat: i64) -> ChatCredentials {
        ChatCredentials {
            vault: self.clone(),
            chat,
        }
    }

    pub fn get(&self, chat: i64) -> Option<String> {
        self.tokens.read().ok()?.get(&chat).cloned()
    }

    pub fn insert(&self, chat: i64, token: String) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(chat, token);
            self.persist(&tokens);
        }
    }

    pub fn remove(&self, chat: i64) {
        if let Ok(mut tokens) = self.tokens.write() {
            if tokens.remove(&chat).is_some() {
                self.persist(&tokens);
            }
        }
    }

    fn persist(&self, tokens: &HashMap<i64, String>) {
        let Some(path) = &self.path else {
            return;
        };
        // Readers only ever see a complete file.
        let staging = path.with_extension("json.tmp");
        let result = serde_json::to_vec(tokens)
            .map_err(std::io::Error::from)
            .and_then(|bytes| fs::write(&staging, bytes))
            .and_then(|()| fs::rename(&staging, path.as_path()));
        if let Err(err) = result {
            log::error!("Failed to write token store {}: {}", path.display(), err);
        }
    }
}

/// The vault seen from one chat.
#[derive(Debug, Clone)]
pub struct ChatCredentials {
    vault: TokenVault,
    chat: i64,
}

impl CredentialProvider for ChatCredentials {
    fn token(&self) -> Option<String> {
        self.vault.get(self.chat)
    }

    fn store(&self, token: String) {
        self.vault.insert(self.chat, token);
    }

    fn clear(&self) {
        self.vault.remove(self.chat);
    }
}
