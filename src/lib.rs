// Library root
// -----------
// Client for the post/auth backend. The binary (`main.rs`) wires these
// modules into an interactive CLI.
//
// Module responsibilities:
// - `config`: defaults, `conf.json` and environment overrides.
// - `logging`: tracing subscriber setup.
// - `gateway`: invokes a named remote function with a JSON payload.
// - `protocol`: function names and request/response payloads.
// - `decode`: turns a raw response into its success payload or an error.
// - `session`: authentication status and the pending two-step workflow.
// - `posts`: post model and the oldest-first timeline.
// - `workflow`: sign-in, registration, reset, posting and deletion.
// - `ui`: the terminal menu that drives `workflow`.
//
// Everything above `ui` is usable without a terminal, which is how the
// tests drive it.
pub mod config;
pub mod decode;
pub mod gateway;
pub mod logging;
pub mod posts;
pub mod protocol;
pub mod session;
pub mod ui;
pub mod workflow;
