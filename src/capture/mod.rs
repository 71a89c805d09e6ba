//! Dynamic capture: the in-process interception agent.
//!
//! [`InstrumentedRegex`] wraps the native matching engine and records every
//! invocation of the pattern-matching operations to the process-wide
//! [`Recorder`] before delegating. Instrumentation is transparent: every
//! operation returns exactly what the engine returns, and capture faults are
//! absorbed by the recorder.

pub mod recorder;

pub use recorder::{Recorder, OUTPUT_PATH_ENV, STACKTRACE_ENV};

use std::borrow::Cow;

use regex::{Captures, Match, Regex};

use crate::model::{DynamicUsageRecord, FuncName};
use recorder::SuppressGuard;

/// A regex whose operations emit one usage record per invocation.
///
/// The primitive operations are [`test`](Self::test) and
/// [`exec`](Self::exec). The compound operations (match, matchAll, replace,
/// search, split) internally delegate through the primitives, holding a
/// suppression guard so one logical call yields exactly one record.
pub struct InstrumentedRegex {
    inner: Regex,
    recorder: &'static Recorder,
}

impl InstrumentedRegex {
    /// Compiles the pattern and attaches the process-wide recorder,
    /// installing it on first use.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            inner: Regex::new(pattern)?,
            recorder: Recorder::install(),
        })
    }

    /// Wraps an already-compiled regex with an explicit recorder.
    pub fn from_parts(inner: Regex, recorder: &'static Recorder) -> Self {
        Self { inner, recorder }
    }

    /// Source text of the wrapped pattern.
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    fn emit(&self, func_name: FuncName, subject: &str) {
        if SuppressGuard::active() {
            return;
        }
        self.recorder.append(&DynamicUsageRecord {
            pattern: self.inner.as_str().to_string(),
            subject: subject.to_string(),
            stack: self.recorder.stack(),
            func_name,
            def: false,
        });
    }

    /// RegExp#test: whether the pattern matches anywhere in the subject.
    pub fn test(&self, subject: &str) -> bool {
        self.emit(FuncName::Test, subject);
        self.inner.is_match(subject)
    }

    /// RegExp#exec: capture groups of the first match.
    pub fn exec<'s>(&self, subject: &'s str) -> Option<Captures<'s>> {
        self.exec_at(subject, 0)
    }

    fn exec_at<'s>(&self, subject: &'s str, start: usize) -> Option<Captures<'s>> {
        self.emit(FuncName::Exec, subject);
        self.inner.captures_at(subject, start)
    }

    /// RegExp#match: the first match in the subject.
    pub fn find_match<'s>(&self, subject: &'s str) -> Option<Match<'s>> {
        self.emit(FuncName::Match, subject);
        let _guard = SuppressGuard::new();
        self.exec(subject).and_then(|caps| caps.get(0))
    }

    /// RegExp#matchAll: every non-overlapping match, with capture groups.
    pub fn match_all<'s>(&self, subject: &'s str) -> Vec<Captures<'s>> {
        self.emit(FuncName::MatchAll, subject);
        let _guard = SuppressGuard::new();

        let mut all = Vec::new();
        let mut at = 0;
        while at <= subject.len() {
            let Some(caps) = self.exec_at(subject, at) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };
            let (start, end) = (whole.start(), whole.end());
            all.push(caps);
            if end == start {
                // Empty match: step over one character to guarantee progress.
                match subject[end..].chars().next() {
                    Some(c) => at = end + c.len_utf8(),
                    None => break,
                }
            } else {
                at = end;
            }
        }
        all
    }

    /// RegExp#search: byte offset of the first match, if any.
    pub fn search(&self, subject: &str) -> Option<usize> {
        self.emit(FuncName::Search, subject);
        let _guard = SuppressGuard::new();
        self.exec(subject).and_then(|caps| caps.get(0)).map(|m| m.start())
    }

    /// RegExp#replace: subject with the first match replaced.
    pub fn replace<'s>(&self, subject: &'s str, replacement: &str) -> Cow<'s, str> {
        self.emit(FuncName::Replace, subject);
        let _guard = SuppressGuard::new();
        self.inner.replace(subject, replacement)
    }

    /// RegExp#split: subject fields separated by matches of the pattern.
    pub fn split<'s>(&self, subject: &'s str) -> Vec<&'s str> {
        self.emit(FuncName::Split, subject);
        let _guard = SuppressGuard::new();
        self.inner.split(subject).collect()
    }
}
