//! Per-call metering state shared by the interpreter and native functions.

use std::collections::HashMap;
use std::time::Instant;

use regex::{Regex, RegexBuilder};

use crate::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::limits::{ExecutionLimits, MAX_VALUE_DEPTH};
use crate::value::Value;

const DEADLINE_CHECK_INTERVAL: u64 = 1024;
const REGEX_SIZE_LIMIT: usize = 1 << 20;
const REGEX_CACHE_CAPACITY: usize = 64;
const PRINT_TRUNCATED: &str = "\n...[output truncated]";

pub struct Runtime {
    limits: ExecutionLimits,
    operations: u64,
    deadline: Option<Instant>,
    printed: String,
    print_truncated: bool,
    regexes: HashMap<String, Regex>,
}

impl Runtime {
    pub fn new(limits: &ExecutionLimits) -> Self {
        Self {
            limits: limits.clone(),
            operations: 0,
            deadline: limits.timeout.map(|timeout| Instant::now() + timeout),
            printed: String::new(),
            print_truncated: false,
            regexes: HashMap::new(),
        }
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn operations(&self) -> u64 {
        self.operations
    }

    /// Charge one evaluation step.
    pub fn tick(&mut self) -> RuntimeResult<()> {
        self.charge(1)
    }

    /// Charge `units` steps of native work.
    pub fn charge(&mut self, units: u64) -> RuntimeResult<()> {
        let before = self.operations;
        self.operations = self.operations.saturating_add(units);
        if self.operations > self.limits.max_operations {
            return Err(RuntimeError::new(
                RuntimeErrorKind::OperationBudgetExhausted,
                format!(
                    "operation budget of {} exhausted",
                    self.limits.max_operations
                ),
            ));
        }
        if before / DEADLINE_CHECK_INTERVAL != self.operations / DEADLINE_CHECK_INTERVAL {
            self.check_deadline()?;
        }
        Ok(())
    }

    pub fn check_deadline(&self) -> RuntimeResult<()> {
        match (self.deadline, self.limits.timeout) {
            (Some(deadline), Some(timeout)) if Instant::now() >= deadline => {
                Err(RuntimeError::new(
                    RuntimeErrorKind::DeadlineExceeded,
                    format!("execution exceeded {}ms", timeout.as_millis()),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Refuse strings and containers longer than the configured ceiling.
    pub fn check_len(&self, len: usize) -> RuntimeResult<()> {
        if len > self.limits.max_value_len {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ValueTooLarge,
                format!(
                    "value of length {len} exceeds the limit of {}",
                    self.limits.max_value_len
                ),
            ));
        }
        Ok(())
    }

    /// Like [`Runtime::check_len`] for a length computed with checked
    /// arithmetic; `None` means the computation overflowed.
    pub fn check_projected_len(&self, len: Option<usize>) -> RuntimeResult<()> {
        match len {
            Some(len) => self.check_len(len),
            None => Err(RuntimeError::new(
                RuntimeErrorKind::ValueTooLarge,
                format!(
                    "value length overflows; the limit is {}",
                    self.limits.max_value_len
                ),
            )),
        }
    }

    pub fn check_value(&self, value: &Value) -> RuntimeResult<()> {
        self.check_len(value.size())
    }

    /// Ensure `value` can be stored `levels` containers deep.
    ///
    /// Walking the value is charged against the operation budget.
    pub fn check_nesting(&mut self, value: &Value, levels: usize) -> RuntimeResult<()> {
        let depth = self.depth_of(value)?;
        if depth + levels > MAX_VALUE_DEPTH {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ValueTooLarge,
                format!("values may not be nested more than {MAX_VALUE_DEPTH} levels deep"),
            ));
        }
        Ok(())
    }

    fn depth_of(&mut self, value: &Value) -> RuntimeResult<usize> {
        let children: Box<dyn Iterator<Item = &Value>> = match value {
            Value::List(items) => Box::new(items.iter()),
            Value::Map(entries) => Box::new(entries.values()),
            _ => return Ok(0),
        };
        let mut deepest = 0;
        for child in children {
            if matches!(child, Value::List(_) | Value::Map(_)) {
                self.tick()?;
                deepest = deepest.max(self.depth_of(child)?);
            }
        }
        Ok(deepest + 1)
    }

    /// Compile (or fetch from cache) a size-limited regular expression.
    pub fn regex(&mut self, pattern: &str) -> RuntimeResult<Regex> {
        if let Some(re) = self.regexes.get(pattern) {
            return Ok(re.clone());
        }
        self.charge(pattern.len() as u64 + 1)?;
        let re = RegexBuilder::new(pattern)
            .size_limit(REGEX_SIZE_LIMIT)
            .dfa_size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| RuntimeError::new(RuntimeErrorKind::Regex, e.to_string()))?;
        if self.regexes.len() >= REGEX_CACHE_CAPACITY {
            self.regexes.clear();
        }
        self.regexes.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    /// Append a line to the capture buffer, truncating at the print limit.
    pub fn print(&mut self, line: &str) {
        if self.print_truncated {
            return;
        }
        let room = self
            .limits
            .max_print_bytes
            .saturating_sub(self.printed.len());
        if line.len() < room {
            self.printed.push_str(line);
            self.printed.push('\n');
            return;
        }
        let mut cut = room;
        while cut > 0 && !line.is_char_boundary(cut) {
            cut -= 1;
        }
        self.printed.push_str(&line[..cut]);
        self.printed.push_str(PRINT_TRUNCATED);
        self.print_truncated = true;
    }

    pub fn take_printed(&mut self) -> String {
        std::mem::take(&mut self.printed)
    }
}
