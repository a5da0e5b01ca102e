use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the trivia backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_or_get_session,
        crate::routes::session::get_session,
        crate::routes::session::join_session,
        crate::routes::session::submit_answer,
        crate::routes::session::list_events,
        crate::routes::sse::session_stream,
        crate::routes::admin::upsert_questions,
        crate::routes::admin::start_game,
        crate::routes::admin::reset_session,
        crate::routes::admin::verify_admin,
        crate::routes::admin::upload_question_image,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::JoinRequest,
            crate::dto::session::AnswerRequest,
            crate::dto::session::SessionView,
            crate::dto::session::PlayerDto,
            crate::dto::session::JoinResponse,
            crate::dto::session::AnswerResponse,
            crate::dto::admin::QuestionInput,
            crate::dto::admin::UpsertQuestionsRequest,
            crate::dto::admin::StartGameRequest,
            crate::dto::admin::ResetSessionRequest,
            crate::dto::admin::ActionResponse,
            crate::dto::admin::ImageUploadResponse,
            crate::dto::events::EventRecord,
            crate::dto::events::EventsPage,
            crate::dao::models::SessionPhase,
            crate::dao::models::PlayerEntity,
            crate::dao::models::QuestionEntity,
            crate::dao::models::EventPayload,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Session lifecycle, joining, and answers"),
        (name = "events", description = "Event log replay and live streaming"),
        (name = "admin", description = "Admin-gated game management"),
    )
)]
pub struct ApiDoc;
