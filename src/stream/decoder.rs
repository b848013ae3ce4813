use crate::error::{IngestError, Result};
use crate::stream::variant::record_from_value;
use crate::types::{InputFormat, RepositoryRecord};
use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing read yet
    Start,
    /// Inside the array, before the first element
    First,
    /// Inside the array, after an element
    AfterElement,
    /// Input exhausted or an error was reported
    Done,
}

/// Lazily decodes repository records from a JSON array (or NDJSON) one element at a time
///
/// The decoder only ever holds the element currently being parsed. Once it
/// returns a fatal error it yields nothing further. An element without a
/// natural key yields `MissingKey` and decoding continues with the next one.
pub struct StreamDecoder<R: BufRead> {
    reader: R,
    format: InputFormat,
    state: State,
    position: usize,
    line: Vec<u8>,
}

impl<R: BufRead> StreamDecoder<R> {
    pub fn new(reader: R, format: InputFormat) -> Self {
        StreamDecoder {
            reader,
            format,
            state: State::Start,
            position: 0,
            line: Vec::new(),
        }
    }

    /// Decoder for a single top-level JSON array
    pub fn array(reader: R) -> Self {
        Self::new(reader, InputFormat::Array)
    }

    /// Decoder for newline-delimited JSON objects
    pub fn ndjson(reader: R) -> Self {
        Self::new(reader, InputFormat::Ndjson)
    }

    /// Number of elements decoded so far
    pub fn position(&self) -> usize {
        self.position
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        let buf = self.reader.fill_buf()?;
        Ok(buf.first().copied())
    }

    fn skip_whitespace(&mut self) -> Result<Option<u8>> {
        loop {
            match self.peek_byte()? {
                Some(b) if b.is_ascii_whitespace() => self.reader.consume(1),
                other => return Ok(other),
            }
        }
    }

    fn next_in_array(&mut self) -> Result<Option<RepositoryRecord>> {
        loop {
            match self.state {
                State::Start => match self.skip_whitespace()? {
                    Some(b'[') => {
                        self.reader.consume(1);
                        self.state = State::First;
                    }
                    Some(b) => {
                        return Err(IngestError::malformed(
                            0,
                            format!("expected '[' at start of input, found {:?}", b as char),
                        ))
                    }
                    None => return Err(IngestError::malformed(0, "empty input, expected '['")),
                },
                State::First => match self.skip_whitespace()? {
                    Some(b']') => {
                        self.reader.consume(1);
                        return self.finish_array();
                    }
                    Some(_) => return self.decode_element().map(Some),
                    None => return Err(IngestError::malformed(self.position, "unterminated array")),
                },
                State::AfterElement => match self.skip_whitespace()? {
                    Some(b',') => {
                        self.reader.consume(1);
                        if self.skip_whitespace()? == Some(b']') {
                            return Err(IngestError::malformed(self.position, "trailing comma"));
                        }
                        return self.decode_element().map(Some);
                    }
                    Some(b']') => {
                        self.reader.consume(1);
                        return self.finish_array();
                    }
                    Some(b) => {
                        return Err(IngestError::malformed(
                            self.position,
                            format!("expected ',' or ']', found {:?}", b as char),
                        ))
                    }
                    None => return Err(IngestError::malformed(self.position, "unterminated array")),
                },
                State::Done => return Ok(None),
            }
        }
    }

    fn decode_element(&mut self) -> Result<RepositoryRecord> {
        let position = self.position;
        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        let value = Value::deserialize(&mut de)
            .map_err(|e| IngestError::malformed(position, e.to_string()))?;

        self.position += 1;
        self.state = State::AfterElement;
        record_from_value(value, position)
    }

    fn finish_array(&mut self) -> Result<Option<RepositoryRecord>> {
        self.state = State::Done;
        match self.skip_whitespace()? {
            None => Ok(None),
            Some(_) => Err(IngestError::malformed(
                self.position,
                "unexpected data after closing ']'",
            )),
        }
    }

    fn next_ndjson(&mut self) -> Result<Option<RepositoryRecord>> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                self.state = State::Done;
                return Ok(None);
            }

            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let position = self.position;
            let value: Value = serde_json::from_slice(&self.line)
                .map_err(|e| IngestError::malformed(position, e.to_string()))?;
            self.position += 1;
            return record_from_value(value, position).map(Some);
        }
    }
}

impl<R: BufRead> Iterator for StreamDecoder<R> {
    type Item = Result<RepositoryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Done {
            return None;
        }

        let result = match self.format {
            InputFormat::Array => self.next_in_array(),
            InputFormat::Ndjson => self.next_ndjson(),
        };

        match result {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                if e.is_fatal() {
                    self.state = State::Done;
                }
                Some(Err(e))
            }
        }
    }
}
