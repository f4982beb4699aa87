//! Observability for Tether: tracing subscriber setup and the OTel GenAI
//! attribute names used when instrumenting interlocutor calls.

pub mod genai_attrs;
pub mod tracing_setup;
