//! Outbound collaborators: chart, certification, registry and lyrics sites,
//! plus the chat-completion API. Each sits behind a trait so the commands can
//! be driven by canned pages in tests.

pub mod billboard;
pub mod genius;
pub mod http;
pub mod llm;
pub mod musicbrainz;
pub mod riaa;
