//! # SitePulse Gateway
//! HTTP surface: the inbound message trigger, channel registration and
//! schedule management.
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/health` | liveness |
//! | GET | `/api/v1/info` | counts + uptime |
//! | POST | `/api/v1/message` | `{user_id, channel_id, text}` → reply |
//! | POST | `/api/v1/channels` | `{channel_id, token}` |
//! | GET | `/api/v1/schedules/{user_id}` | list |
//! | DELETE | `/api/v1/schedules/{user_id}[?url=]` | cancel one or all |

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start_server};
