//! # SitePulse Agent
//! The conversational side: classifies free text into an intent, keeps
//! per-user sessions and dispatches to the scan workflow, the scheduler or
//! the advisor.
//!
//! ## Flow
//! ```text
//! handle(user, channel, text)
//!   ├── SessionStore: active report? (30 min TTL)
//!   ├── classify(text) → Intent
//!   ├── dispatch
//!   │     ├── NewAnalysis      → ScanWorkflow → Advisor summary
//!   │     ├── Report*/Fix*     → Advisor with last findings
//!   │     ├── Schedule*/Cancel → ScanScheduler
//!   │     └── Unsupported      → help text
//!   └── history (cap 20) + mirror reply to the channel
//! ```
//! Sessions live in memory and are lost on restart.

pub mod advisor;
pub mod intent;
pub mod router;
pub mod session;

pub use advisor::OpenAiAdvisor;
pub use intent::{CancelTarget, Intent, classify, extract_url};
pub use router::{ConversationRouter, RouterReply};
pub use session::{SessionStore, UserSession};
