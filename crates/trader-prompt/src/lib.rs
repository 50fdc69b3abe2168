//! Prompt composition for market analysis
//!
//! Templates use `{name}` placeholders and are filled from a JSON object in
//! a single pass:
//!
//! ```
//! use trader_prompt::PromptTemplate;
//! use serde_json::json;
//!
//! let template = PromptTemplate::new("analysis", "Analyze {symbol} now, ignore {other}");
//! let prompt = template.render(&json!({ "symbol": "ETHUSDT" })).unwrap();
//! assert_eq!(prompt, "Analyze ETHUSDT now, ignore {other}");
//! ```

mod error;
mod template;
pub mod templates;

pub use error::{PromptError, Result};
pub use template::PromptTemplate;
