//! 上游SSE响应的行缓冲解析
//!
//! TCP分块与SSE事件边界不对齐：一个分块可能包含多个事件，
//! 一条 `data:` 行也可能被拆到两个分块里，多字节字符同样可能被拆开。
//! 这里缓存未解码的字节，只在收到换行后解码并产出完整的数据负载。

use bytes::BytesMut;

/// 行缓冲器
#[derive(Debug, Default)]
pub(crate) struct SseLineBuffer {
    pending: BytesMut,
}

impl SseLineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 追加一个分块，返回其中所有完整的 `data:` 负载
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line = self.pending.split_to(pos + 1);
            if let Some(payload) = data_payload(&String::from_utf8_lossy(&line)) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// 上游结束时处理剩余的不完整行
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = self.pending.split();
        data_payload(&String::from_utf8_lossy(&rest))
    }
}

fn data_payload(line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    Some(data.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut buffer = SseLineBuffer::new();
        let payloads = buffer.push(b"data: {\"a\":1}\r\n\r\ndata: {\"a\":2}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"a\":2}"]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(b"data: {\"te").is_empty());
        assert_eq!(buffer.push(b"xt\":\"hi\"}\n"), vec!["{\"text\":\"hi\"}"]);
    }

    #[test]
    fn test_ignores_other_fields_and_done() {
        let mut buffer = SseLineBuffer::new();
        let payloads = buffer.push(b": keep-alive\nevent: message\ndata: [DONE]\n");
        assert!(payloads.is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(b"data: tail").is_empty());
        assert_eq!(buffer.finish().as_deref(), Some("tail"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(b"data: {\"text\":\"caf\xC3").is_empty());
        assert_eq!(buffer.push(b"\xA9\"}\n\n"), vec!["{\"text\":\"caf\u{e9}\"}"]);
    }
}
