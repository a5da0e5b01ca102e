/// OpenAPI documentation generation.
pub mod documentation;
/// Per-session ordered event log, the engine's only publication channel.
pub mod event_log;
/// Game engine facade: join, questions, start, reset, answer submission.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Question image upload glue.
pub mod media_service;
/// Read-only session projections and event pages.
pub mod public_service;
/// Timed question/reveal/scoreboard cycles.
pub mod scheduler;
/// Pure answer scoring and leaderboard ordering.
pub mod scoring;
/// SSE stream assembly (stored replay followed by live relay).
pub mod sse_service;
/// Storage connection supervision and stale-session sweeping.
pub mod storage_supervisor;
