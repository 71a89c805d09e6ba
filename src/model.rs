use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder pattern recorded when a construction argument is not a
/// string literal and its value cannot be known without running the program.
pub const DYNAMIC_PATTERN: &str = "DYNAMIC-PATTERN";

/// Placeholder flags recorded when a flags argument is present but not a
/// string literal.
pub const DYNAMIC_FLAGS: &str = "DYNAMIC-FLAGS";

/// One regex construction or implicit-use site found by static analysis.
///
/// `pattern` and `flags` are always populated: sentinel strings stand in for
/// values that cannot be determined statically, so consumers never branch on
/// optionality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticUsageRecord {
    pub source_file: String,
    pub pattern: String,
    /// 1-based source line of the construction site.
    pub line_no: u32,
    pub flags: String,
}

/// One runtime invocation of a pattern-matching operation, captured by the
/// interception agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicUsageRecord {
    /// Source text of the regex object invoked.
    pub pattern: String,
    /// The subject string passed to the operation.
    pub subject: String,
    /// Call-stack text; empty unless stack capture is enabled.
    pub stack: String,
    #[serde(rename = "funcName")]
    pub func_name: FuncName,
    /// Reserved discriminator for future record kinds. Always false here.
    pub def: bool,
}

/// The pattern-matching operations the interception agent wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncName {
    #[serde(rename = "RegExp#test")]
    Test,
    #[serde(rename = "RegExp#exec")]
    Exec,
    #[serde(rename = "RegExp#match")]
    Match,
    #[serde(rename = "RegExp#matchAll")]
    MatchAll,
    #[serde(rename = "RegExp#replace")]
    Replace,
    #[serde(rename = "RegExp#search")]
    Search,
    #[serde(rename = "RegExp#split")]
    Split,
}

impl FuncName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuncName::Test => "RegExp#test",
            FuncName::Exec => "RegExp#exec",
            FuncName::Match => "RegExp#match",
            FuncName::MatchAll => "RegExp#matchAll",
            FuncName::Replace => "RegExp#replace",
            FuncName::Search => "RegExp#search",
            FuncName::Split => "RegExp#split",
        }
    }
}

impl fmt::Display for FuncName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
