use std::collections::VecDeque;

/// Longest single line kept, in bytes.
pub(crate) const MAX_LINE_BYTES: usize = 4096;

/// Ring buffer holding the last `max_lines` lines of a child's output stream.
#[derive(Debug)]
pub struct CaptureBuffer {
    max_lines: usize,
    lines: VecDeque<String>,
    dropped: u64,
}

impl CaptureBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines,
            lines: VecDeque::with_capacity(max_lines.min(64)),
            dropped: 0,
        }
    }

    pub fn push_line(&mut self, mut line: String) {
        if self.max_lines == 0 {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        if line.len() > MAX_LINE_BYTES {
            let mut cut = MAX_LINE_BYTES;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
        }
        self.lines.push_back(line);
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    /// Lines evicted to stay within the bound
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Last `n` lines joined with newlines
    pub fn tail(&self, n: usize) -> String {
        let start = self.lines.len().saturating_sub(n);
        self.lines
            .iter()
            .skip(start)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_last_lines() {
        let mut buf = CaptureBuffer::new(3);
        for i in 0..5 {
            buf.push_line(format!("line {}", i));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.dropped(), 2);
        assert_eq!(buf.tail(2), "line 3\nline 4");
        assert_eq!(
            buf.into_lines(),
            vec!["line 2".to_string(), "line 3".to_string(), "line 4".to_string()]
        );
    }

    #[test]
    fn test_long_line_truncated_on_char_boundary() {
        let mut buf = CaptureBuffer::new(1);
        buf.push_line("é".repeat(MAX_LINE_BYTES));
        let line = &buf.into_lines()[0];
        assert!(line.len() <= MAX_LINE_BYTES);
        assert!(line.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_zero_capacity() {
        let mut buf = CaptureBuffer::new(0);
        buf.push_line("x".to_string());
        assert!(buf.is_empty());
        assert_eq!(buf.dropped(), 1);
    }
}
