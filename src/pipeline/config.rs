// Constants and run configuration for the lexer/parser pipeline

/// Input units that may be queued before `submit` blocks
pub const UNIT_QUEUE_CAPACITY: usize = 10;

/// Tokens buffered between the lexer and the parser
pub const TOKEN_BUFFER_CAPACITY: usize = 10;

/// AST roots buffered between the parser and the consumer
pub const ROOT_BUFFER_CAPACITY: usize = 10;

/// Precedence of a `binary` operator declared without a literal
pub const DEFAULT_BINARY_PRECEDENCE: u32 = 30;

/// Minimum precedence a binary operator needs to be parsed as one.
/// Operators declared below this never bind.
pub const MIN_BINARY_PRECEDENCE: u32 = 1;

/// Precedence of the built-in binary operators
pub const BUILTIN_PRECEDENCE: &[(char, u32)] = &[
    ('=', 2),
    ('<', 10),
    ('+', 20),
    ('-', 20),
    ('*', 40),
    ('/', 40),
];

/// Channel sizes and tracing switches for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub unit_queue: usize,
    pub token_buffer: usize,
    pub root_buffer: usize,
    /// Log every token at `trace` level as it is emitted
    pub trace_tokens: bool,
}

impl PipelineConfig {
    pub fn new() -> Self {
        PipelineConfig {
            unit_queue: UNIT_QUEUE_CAPACITY,
            token_buffer: TOKEN_BUFFER_CAPACITY,
            root_buffer: ROOT_BUFFER_CAPACITY,
            trace_tokens: false,
        }
    }

    pub fn with_unit_queue(mut self, capacity: usize) -> Self {
        self.unit_queue = capacity;
        self
    }

    pub fn with_token_buffer(mut self, capacity: usize) -> Self {
        self.token_buffer = capacity;
        self
    }

    pub fn with_root_buffer(mut self, capacity: usize) -> Self {
        self.root_buffer = capacity;
        self
    }

    pub fn with_token_tracing(mut self) -> Self {
        self.trace_tokens = true;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = PipelineConfig::default()
            .with_token_buffer(1)
            .with_root_buffer(2)
            .with_unit_queue(0)
            .with_token_tracing();
        assert_eq!(config.token_buffer, 1);
        assert_eq!(config.root_buffer, 2);
        assert_eq!(config.unit_queue, 0);
        assert!(config.trace_tokens);
        assert_eq!(PipelineConfig::new().token_buffer, TOKEN_BUFFER_CAPACITY);
    }
}
