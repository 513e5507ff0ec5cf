mod common;

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use common::{api, serve, Hits, CHAT};
use practice_bot::api::portal::QuizVariant;
use practice_bot::api::ApiError;
use practice_bot::quiz::session::QuizBackend;
use practice_bot::quiz::{
    AnswerRecord, Difficulty, QuizError, QuizRequest, SubmitTarget, DEFAULT_TIME_LIMIT,
};
use serde_json::{json, Value};

fn request(level: Difficulty) -> QuizRequest {
    QuizRequest {
        stack_id: "stack-1".to_string(),
        level,
    }
}

fn stack_questions() -> Value {
    json!([
        {
            "_id": "q1",
            "question": "Which macro prints a line?",
            "options": [
                {"text": "println!", "isCorrect": true},
                {"text": "print_line!", "isCorrect": false}
            ],
            "points": 10,
            "timeLimit": 20
        },
        {
            "_id": "q2",
            "question": "Which keyword makes a binding mutable?",
            "options": [
                {"text": "mut", "isCorrect": true},
                {"text": "var", "isCorrect": false}
            ],
            "points": 5
        }
    ])
}

fn questions_router(hits: Hits, body: Value) -> Router {
    Router::new().route(
        "/api/techstack/:stack/questions/:level",
        get(
            move |Path((stack, level)): Path<(String, String)>, headers: HeaderMap| {
                let hits = hits.clone();
                let body = body.clone();
                async move {
                    hits.record(format!("/api/techstack/{}/questions/{}", stack, level), &headers, None);
                    Json(body)
                }
            },
        ),
    )
}

fn status_router(hits: Hits, status: StatusCode, body: Value) -> Router {
    let handler = move |headers: HeaderMap| {
        let hits = hits.clone();
        let body = body.clone();
        async move {
            hits.record("any", &headers, None);
            (status, Json(body))
        }
    };
    Router::new()
        .route("/api/techstack/:stack/questions/:level", get(handler.clone()))
        .route("/api/profile/quiz-attempts", get(handler))
}

#[tokio::test]
async fn missing_token_fails_without_calling_the_backend() {
    let hits = Hits::default();
    let url = serve(questions_router(hits.clone(), stack_questions())).await;
    let (api, _) = api(url, QuizVariant::TechStack, None);

    let err = api.load(&request(Difficulty::Beginner)).await.unwrap_err();

    assert_eq!(err, QuizError::AuthRequired);
    assert_eq!(err.to_string(), "Please login to attempt the quiz");
    assert!(hits.all().is_empty());
}

#[tokio::test]
async fn techstack_questions_use_bearer_token_and_capitalized_level() {
    let hits = Hits::default();
    let url = serve(questions_router(hits.clone(), stack_questions())).await;
    let (api, _) = api(url, QuizVariant::TechStack, Some("abc123"));

    let loaded = api.load(&request(Difficulty::Intermediate)).await.unwrap();

    let hit = &hits.all()[0];
    assert_eq!(hit.path, "/api/techstack/stack-1/questions/Intermediate");
    assert_eq!(hit.authorization.as_deref(), Some("Bearer abc123"));

    assert_eq!(loaded.questions.len(), 2);
    assert_eq!(loaded.questions[0].id, "q1");
    assert_eq!(loaded.questions[0].time_limit, 20);
    assert_eq!(loaded.questions[0].correct_option(), Some(0));
    assert_eq!(loaded.questions[1].time_limit, DEFAULT_TIME_LIMIT);
    assert_eq!(loaded.questions[1].points, 5);
    assert_eq!(
        loaded.target,
        SubmitTarget::TechStack {
            stack_id: "stack-1".to_string(),
            level: Difficulty::Intermediate,
        }
    );
}

#[tokio::test]
async fn unauthorized_response_clears_the_stored_token() {
    let hits = Hits::default();
    let url = serve(status_router(
        hits.clone(),
        StatusCode::UNAUTHORIZED,
        json!({"message": "Token expired"}),
    ))
    .await;
    let (api, vault) = api(url, QuizVariant::TechStack, Some("stale"));

    let err = api.load(&request(Difficulty::Beginner)).await.unwrap_err();

    assert_eq!(err, QuizError::AuthRequired);
    assert_eq!(hits.all().len(), 1);
    assert_eq!(vault.get(CHAT), None);
}

#[tokio::test]
async fn forbidden_response_keeps_the_token() {
    let hits = Hits::default();
    let url = serve(status_router(hits.clone(), StatusCode::FORBIDDEN, json!({}))).await;
    let (api, vault) = api(url, QuizVariant::TechStack, Some("valid"));

    let err = api.quiz_history().await.unwrap_err();

    assert!(matches!(err, ApiError::Forbidden));
    assert_eq!(QuizError::from(err), QuizError::Forbidden);
    assert_eq!(vault.get(CHAT).as_deref(), Some("valid"));
}

#[tokio::test]
async fn server_error_message_is_surfaced() {
    let url = serve(status_router(
        Hits::default(),
        StatusCode::NOT_FOUND,
        json!({"message": "No questions for this level"}),
    ))
    .await;
    let (api, _) = api(url, QuizVariant::TechStack, Some("valid"));

    let err = api.load(&request(Difficulty::Advanced)).await.unwrap_err();

    assert_eq!(
        err,
        QuizError::NetworkOrServer("No questions for this level".to_string())
    );
}

#[tokio::test]
async fn server_error_without_message_reports_the_status() {
    let url = serve(status_router(
        Hits::default(),
        StatusCode::INTERNAL_SERVER_ERROR,
        json!(null),
    ))
    .await;
    let (api, _) = api(url, QuizVariant::TechStack, Some("valid"));

    let err = api.load(&request(Difficulty::Advanced)).await.unwrap_err();

    assert_eq!(
        err,
        QuizError::NetworkOrServer("HTTP error! status: 500".to_string())
    );
}

#[tokio::test]
async fn non_array_question_set_is_a_validation_error() {
    let url = serve(questions_router(
        Hits::default(),
        json!({"questions": "coming soon"}),
    ))
    .await;
    let (api, _) = api(url, QuizVariant::TechStack, Some("valid"));

    let err = api.load(&request(Difficulty::Beginner)).await.unwrap_err();

    assert!(matches!(err, QuizError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = reqwest::Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    drop(listener);
    let (api, _) = api(url, QuizVariant::TechStack, Some("valid"));

    let err = api.load(&request(Difficulty::Beginner)).await.unwrap_err();

    assert!(matches!(err, QuizError::NetworkOrServer(_)), "got {:?}", err);
}

#[tokio::test]
async fn techstack_submission_posts_the_answer_sheet() {
    let hits = Hits::default();
    let recorded = hits.clone();
    let router = Router::new().route(
        "/api/techstack/:stack/questions/:level/submit",
        post(
            move |Path((stack, level)): Path<(String, String)>, headers: HeaderMap, Json(body): Json<Value>| {
                let hits = recorded.clone();
                async move {
                    hits.record(
                        format!("/api/techstack/{}/questions/{}/submit", stack, level),
                        &headers,
                        Some(body),
                    );
                    Json(json!({"totalScore": 10}))
                }
            },
        ),
    );
    let url = serve(router).await;
    let (api, _) = api(url, QuizVariant::TechStack, Some("abc123"));

    let target = SubmitTarget::TechStack {
        stack_id: "stack-1".to_string(),
        level: Difficulty::Beginner,
    };
    let answers = vec![
        AnswerRecord {
            question_id: "q1".to_string(),
            selected_option_index: Some(0),
            time_spent: 5,
        },
        AnswerRecord {
            question_id: "q2".to_string(),
            selected_option_index: None,
            time_spent: 30,
        },
    ];
    let verdict = api.submit(&target, &answers).await.unwrap();

    assert_eq!(verdict.total_score, Some(10));
    let hits = hits.all();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/api/techstack/stack-1/questions/Beginner/submit");
    assert_eq!(hits[0].authorization.as_deref(), Some("Bearer abc123"));
    assert_eq!(
        hits[0].body,
        Some(json!({
            "answers": [
                {"questionId": "q1", "selectedOptionIndex": 0, "timeSpent": 5},
                {"questionId": "q2", "selectedOptionIndex": -1, "timeSpent": 30}
            ]
        }))
    );
}

#[tokio::test]
async fn practice_variant_starts_and_submits_by_attempt_id() {
    let hits = Hits::default();
    let on_start = hits.clone();
    let on_submit = hits.clone();
    let router = Router::new()
        .route(
            "/api/practice/start",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let hits = on_start.clone();
                async move {
                    hits.record("/api/practice/start", &headers, Some(body));
                    Json(json!({
                        "attemptId": "attempt-9",
                        "questions": [
                            {"question": "Borrowing rule?", "options": ["one &mut", "many &mut"], "timeLimit": 45},
                            {"_id": "p2", "question": "Box is on the?", "options": ["heap", "stack"]}
                        ]
                    }))
                }
            }),
        )
        .route(
            "/api/practice/submit/:attempt",
            post(
                move |Path(attempt): Path<String>, headers: HeaderMap, Json(body): Json<Value>| {
                    let hits = on_submit.clone();
                    async move {
                        hits.record(format!("/api/practice/submit/{}", attempt), &headers, Some(body));
                        Json(json!({
                            "totalScore": 1,
                            "questions": [
                                {"question": "Borrowing rule?", "selectedOption": 0, "isCorrect": true, "explanation": "Only one mutable borrow."},
                                {"question": "Box is on the?", "selectedOption": null, "isCorrect": false, "explanation": "Box allocates on the heap."}
                            ]
                        }))
                    }
                },
            ),
        );
    let url = serve(router).await;
    let (api, _) = api(url, QuizVariant::Practice, Some("abc123"));

    let loaded = api.load(&request(Difficulty::Advanced)).await.unwrap();
    assert_eq!(loaded.questions.len(), 2);
    assert_eq!(loaded.questions[0].id, "0");
    assert_eq!(loaded.questions[0].time_limit, 45);
    assert_eq!(loaded.questions[0].options[0].is_correct, None);
    assert_eq!(loaded.questions[1].id, "p2");
    assert_eq!(
        loaded.target,
        SubmitTarget::Practice {
            attempt_id: "attempt-9".to_string()
        }
    );

    let answers = vec![
        AnswerRecord {
            question_id: "0".to_string(),
            selected_option_index: Some(0),
            time_spent: 12,
        },
        AnswerRecord {
            question_id: "p2".to_string(),
            selected_option_index: None,
            time_spent: 30,
        },
    ];
    let verdict = api.submit(&loaded.target, &answers).await.unwrap();

    assert_eq!(verdict.total_score, Some(1));
    assert_eq!(verdict.outcomes.len(), 2);
    assert_eq!(verdict.outcomes[0].selected, Some(0));
    assert!(verdict.outcomes[0].is_correct);
    assert_eq!(verdict.outcomes[1].selected, None);

    let hits = hits.all();
    assert_eq!(hits[0].path, "/api/practice/start");
    assert_eq!(
        hits[0].body,
        Some(json!({"techStackId": "stack-1", "difficulty": "advanced"}))
    );
    assert_eq!(hits[1].path, "/api/practice/submit/attempt-9");
    assert_eq!(hits[1].body, Some(json!({"answers": [0, null]})));
}

#[tokio::test]
async fn tech_stacks_do_not_need_a_token() {
    let hits = Hits::default();
    let recorded = hits.clone();
    let router = Router::new().route(
        "/api/practice/tech-stacks",
        get(move |headers: HeaderMap| {
            let hits = recorded.clone();
            async move {
                hits.record("/api/practice/tech-stacks", &headers, None);
                Json(json!([
                    {"_id": "s1", "name": "Rust", "questionCounts": {"beginner": 12}},
                    {"_id": "s2", "name": "Go", "description": "Gophers", "levels": [{"name": "Beginner", "requiredScore": 70}]}
                ]))
            }
        }),
    );
    let url = serve(router).await;
    let (api, _) = api(url, QuizVariant::Practice, None);

    let stacks = api.tech_stacks().await.unwrap();

    assert_eq!(stacks.len(), 2);
    assert_eq!(stacks[0].question_counts.get("beginner"), Some(&12));
    assert_eq!(stacks[1].levels[0].required_score, Some(70));
    assert_eq!(hits.all()[0].authorization, None);
}

#[tokio::test]
async fn quiz_history_is_decoded() {
    let router = Router::new().route(
        "/api/profile/quiz-attempts",
        get(|| async {
            Json(json!({
                "quizAttempts": [
                    {"techStack": {"name": "Rust", "icon": "rust.svg"}, "level": "Beginner", "percentageScore": 85.5, "completedAt": "2024-05-02T08:00:00.000Z"}
                ],
                "stats": {"totalAttempts": 1, "passRate": 100}
            }))
        }),
    );
    let url = serve(router).await;
    let (api, _) = api(url, QuizVariant::TechStack, Some("abc123"));

    let history = api.quiz_history().await.unwrap();

    assert_eq!(history.stats.total_attempts, 1);
    assert_eq!(history.quiz_attempts[0].tech_stack.name, "Rust");
    assert_eq!(history.quiz_attempts[0].percentage_score, 85.5);
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let hits = Hits::default();
    let router = Router::new().nest("/backend", questions_router(hits.clone(), stack_questions()));
    let url = serve(router).await.join("backend").unwrap();
    let (api, _) = api(url, QuizVariant::TechStack, Some("abc123"));

    api.load(&request(Difficulty::Beginner)).await.unwrap();

    assert_eq!(hits.all()[0].path, "/api/techstack/stack-1/questions/Beginner");
}
