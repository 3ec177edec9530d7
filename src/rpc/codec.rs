//! XML-RPC wire codec.
//!
//! Encodes method calls from JSON values and decodes method responses back
//! into JSON values. The FreeCAD addon runs Python's `SimpleXMLRPCServer`
//! with `allow_none`, so `<nil/>` is accepted in both directions.
//!
//! | JSON      | XML-RPC                                   |
//! |-----------|-------------------------------------------|
//! | `null`    | `<nil/>`                                  |
//! | bool      | `<boolean>`                               |
//! | integer   | `<int>` (or `<i8>` outside the i32 range) |
//! | float     | `<double>`                                |
//! | string    | `<string>` (untyped `<value>` on decode)  |
//! | array     | `<array><data>`                           |
//! | object    | `<struct>`                                |
//!
//! `<base64>` and `<dateTime.iso8601>` decode to their text.

use std::fmt::Write as _;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Number, Value};

use crate::rpc::error::{RpcError, RpcResult};

/// Encodes a `methodCall` document.
#[must_use]
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut xml = String::with_capacity(128);
    xml.push_str("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    xml.push_str(&escape(method));
    xml.push_str("</methodName><params>");
    for param in params {
        xml.push_str("<param>");
        encode_value(param, &mut xml);
        xml.push_str("</param>");
    }
    xml.push_str("</params></methodCall>");
    xml
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Null => out.push_str("<nil/>"),
        Value::Bool(b) => {
            out.push_str(if *b {
                "<boolean>1</boolean>"
            } else {
                "<boolean>0</boolean>"
            });
        }
        Value::Number(n) => encode_number(n, out),
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Object(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn encode_number(n: &Number, out: &mut String) {
    // Writing to a String cannot fail.
    if let Some(i) = n.as_i64() {
        if i32::try_from(i).is_ok() {
            let _ = write!(out, "<int>{i}</int>");
        } else {
            let _ = write!(out, "<i8>{i}</i8>");
        }
    } else if let Some(f) = n.as_f64() {
        let _ = write!(out, "<double>{f}</double>");
    }
}

/// A flattened XML event.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open(String),
    Close(String),
    Empty(String),
    Text(String),
}

fn tokenize(xml: &str) -> RpcResult<Vec<Token>> {
    let mut reader = Reader::from_str(xml);
    let mut tokens = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => tokens.push(Token::Open(
                String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            )),
            Event::End(e) => tokens.push(Token::Close(
                String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            )),
            Event::Empty(e) => tokens.push(Token::Empty(
                String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            )),
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| RpcError::malformed(format!("bad text content: {e}")))?;
                tokens.push(Token::Text(text.into_owned()));
            }
            Event::CData(c) => {
                tokens.push(Token::Text(
                    String::from_utf8_lossy(&c.into_inner()).into_owned(),
                ));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(tokens)
}

/// Recursive-descent parser over the flattened token stream.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// Skips whitespace-only text between structural elements.
    fn skip_ws(&mut self) {
        while let Some(Token::Text(t)) = self.peek() {
            if t.trim().is_empty() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn expect_open(&mut self, tag: &str) -> RpcResult<()> {
        self.skip_ws();
        match self.next() {
            Some(Token::Open(name)) if name == tag => Ok(()),
            other => Err(RpcError::malformed(format!(
                "expected <{tag}>, found {other:?}"
            ))),
        }
    }

    fn expect_close(&mut self, tag: &str) -> RpcResult<()> {
        self.skip_ws();
        match self.next() {
            Some(Token::Close(name)) if name == tag => Ok(()),
            other => Err(RpcError::malformed(format!(
                "expected </{tag}>, found {other:?}"
            ))),
        }
    }

    /// Collects text up to the closing `tag`.
    fn text_until_close(&mut self, tag: &str) -> RpcResult<String> {
        let mut text = String::new();
        loop {
            match self.next() {
                Some(Token::Text(t)) => text.push_str(&t),
                Some(Token::Close(name)) if name == tag => return Ok(text),
                other => {
                    return Err(RpcError::malformed(format!(
                        "unexpected {other:?} inside <{tag}>"
                    )))
                }
            }
        }
    }

    fn parse_value(&mut self) -> RpcResult<Value> {
        self.skip_ws();
        match self.next() {
            Some(Token::Empty(name)) if name == "value" => Ok(Value::String(String::new())),
            Some(Token::Open(name)) if name == "value" => self.parse_value_body(),
            other => Err(RpcError::malformed(format!(
                "expected <value>, found {other:?}"
            ))),
        }
    }

    fn parse_value_body(&mut self) -> RpcResult<Value> {
        let mut leading = String::new();
        while let Some(Token::Text(t)) = self.peek() {
            leading.push_str(t);
            self.pos += 1;
        }

        match self.next() {
            // Untyped value: the text is a string.
            Some(Token::Close(name)) if name == "value" => Ok(Value::String(leading)),
            Some(Token::Empty(kind)) => {
                let value = Self::empty_typed(&kind)?;
                self.expect_close("value")?;
                Ok(value)
            }
            Some(Token::Open(kind)) => {
                let value = self.parse_typed(&kind)?;
                self.expect_close("value")?;
                Ok(value)
            }
            other => Err(RpcError::malformed(format!(
                "unexpected {other:?} inside <value>"
            ))),
        }
    }

    fn empty_typed(kind: &str) -> RpcResult<Value> {
        match kind {
            "nil" => Ok(Value::Null),
            "string" | "base64" => Ok(Value::String(String::new())),
            "array" => Ok(Value::Array(Vec::new())),
            "struct" => Ok(Value::Object(Map::new())),
            other => Err(RpcError::malformed(format!("empty <{other}/> has no value"))),
        }
    }

    fn parse_typed(&mut self, kind: &str) -> RpcResult<Value> {
        match kind {
            "string" | "dateTime.iso8601" => Ok(Value::String(self.text_until_close(kind)?)),
            "base64" => {
                let text = self.text_until_close(kind)?;
                Ok(Value::String(text.split_whitespace().collect()))
            }
            "int" | "i4" | "i8" | "i1" | "i2" => {
                let text = self.text_until_close(kind)?;
                let n: i64 = text
                    .trim()
                    .parse()
                    .map_err(|_| RpcError::malformed(format!("bad integer '{text}'")))?;
                Ok(Value::from(n))
            }
            "boolean" => {
                let text = self.text_until_close(kind)?;
                match text.trim() {
                    "1" => Ok(Value::Bool(true)),
                    "0" => Ok(Value::Bool(false)),
                    other => Err(RpcError::malformed(format!("bad boolean '{other}'"))),
                }
            }
            "double" => {
                let text = self.text_until_close(kind)?;
                let f: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| RpcError::malformed(format!("bad double '{text}'")))?;
                // NaN and infinities have no JSON form.
                Ok(Number::from_f64(f).map_or(Value::Null, Value::Number))
            }
            "nil" => {
                self.text_until_close(kind)?;
                Ok(Value::Null)
            }
            "array" => self.parse_array(),
            "struct" => self.parse_struct(),
            other => Err(RpcError::malformed(format!("unknown value type <{other}>"))),
        }
    }

    fn parse_array(&mut self) -> RpcResult<Value> {
        self.skip_ws();
        let mut items = Vec::new();
        match self.next() {
            Some(Token::Empty(name)) if name == "data" => {}
            Some(Token::Open(name)) if name == "data" => loop {
                self.skip_ws();
                if matches!(self.peek(), Some(Token::Close(n)) if n == "data") {
                    self.pos += 1;
                    break;
                }
                items.push(self.parse_value()?);
            },
            other => {
                return Err(RpcError::malformed(format!(
                    "expected <data> in array, found {other:?}"
                )))
            }
        }
        self.expect_close("array")?;
        Ok(Value::Array(items))
    }

    fn parse_struct(&mut self) -> RpcResult<Value> {
        let mut members = Map::new();
        loop {
            self.skip_ws();
            match self.next() {
                Some(Token::Close(name)) if name == "struct" => break,
                Some(Token::Open(name)) if name == "member" => {
                    let (key, value) = self.parse_member()?;
                    members.insert(key, value);
                }
                other => {
                    return Err(RpcError::malformed(format!(
                        "expected <member>, found {other:?}"
                    )))
                }
            }
        }
        Ok(Value::Object(members))
    }

    fn parse_member(&mut self) -> RpcResult<(String, Value)> {
        let mut key = None;
        let mut value = None;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(Token::Open(name)) if name == "name" => {
                    self.pos += 1;
                    key = Some(self.text_until_close("name")?);
                }
                Some(Token::Empty(name)) if name == "name" => {
                    self.pos += 1;
                    key = Some(String::new());
                }
                Some(Token::Open(name) | Token::Empty(name)) if name == "value" => {
                    value = Some(self.parse_value()?);
                }
                Some(Token::Close(name)) if name == "member" => {
                    self.pos += 1;
                    break;
                }
                other => {
                    return Err(RpcError::malformed(format!(
                        "unexpected {other:?} inside <member>"
                    )))
                }
            }
        }
        match (key, value) {
            (Some(k), Some(v)) => Ok((k, v)),
            _ => Err(RpcError::malformed("struct member without name or value")),
        }
    }
}

/// Decodes a `methodResponse` document.
///
/// # Errors
///
/// Returns [`RpcError::Fault`] when the response carries a fault, and
/// [`RpcError::Xml`] or [`RpcError::Malformed`] when it cannot be parsed.
pub fn decode_response(xml: &str) -> RpcResult<Value> {
    let mut parser = Parser {
        tokens: tokenize(xml)?,
        pos: 0,
    };

    parser.expect_open("methodResponse")?;
    parser.skip_ws();

    match parser.next() {
        Some(Token::Open(name)) if name == "params" => {
            parser.skip_ws();
            if matches!(parser.peek(), Some(Token::Close(n)) if n == "params") {
                return Ok(Value::Null);
            }
            parser.expect_open("param")?;
            let value = parser.parse_value()?;
            parser.expect_close("param")?;
            parser.expect_close("params")?;
            Ok(value)
        }
        Some(Token::Empty(name)) if name == "params" => Ok(Value::Null),
        Some(Token::Open(name)) if name == "fault" => {
            let fault = parser.parse_value()?;
            let code = fault.get("faultCode").and_then(Value::as_i64).unwrap_or(0);
            let message = fault
                .get("faultString")
                .and_then(Value::as_str)
                .unwrap_or("unknown fault")
                .to_string();
            Err(RpcError::Fault { code, message })
        }
        other => Err(RpcError::malformed(format!(
            "expected <params> or <fault>, found {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wrap(value_xml: &str) -> String {
        format!(
            "<?xml version='1.0'?>\n<methodResponse>\n<params>\n<param>\n{value_xml}\n</param>\n</params>\n</methodResponse>\n"
        )
    }

    #[test]
    fn encode_simple_call() {
        let xml = encode_call("create_document", &[json!("My <Doc>")]);
        assert!(xml.contains("<methodName>create_document</methodName>"));
        assert!(xml.contains("<string>My &lt;Doc&gt;</string>"));
    }

    #[test]
    fn encode_nested_struct() {
        let xml = encode_call(
            "create_object",
            &[json!("Doc"), json!({"Name": "Box", "Analysis": null, "Properties": {"Length": 10, "Ratio": 0.5, "Big": 5_000_000_000_i64, "Flag": true}})],
        );
        assert!(xml.contains("<member><name>Analysis</name><value><nil/></value></member>"));
        assert!(xml.contains("<int>10</int>"));
        assert!(xml.contains("<double>0.5</double>"));
        assert!(xml.contains("<i8>5000000000</i8>"));
        assert!(xml.contains("<boolean>1</boolean>"));
    }

    #[test]
    fn decode_python_struct() {
        let xml = wrap(
            "<value><struct>\n<member>\n<name>success</name>\n<value><boolean>1</boolean></value>\n</member>\n<member>\n<name>message</name>\n<value><string>Output:  a &amp; b \n</string></value>\n</member>\n</struct></value>",
        );
        let value = decode_response(&xml).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["message"], json!("Output:  a & b \n"));
    }

    #[test]
    fn decode_untyped_and_empty_strings() {
        assert_eq!(decode_response(&wrap("<value>plain</value>")).unwrap(), json!("plain"));
        assert_eq!(decode_response(&wrap("<value><string/></value>")).unwrap(), json!(""));
        assert_eq!(decode_response(&wrap("<value></value>")).unwrap(), json!(""));
    }

    #[test]
    fn decode_array_of_mixed_values() {
        let xml = wrap(
            "<value><array><data>\n<value><int>3</int></value>\n<value><double>2.5</double></value>\n<value><nil/></value>\n<value><base64>iVBO\nRw0K</base64></value>\n</data></array></value>",
        );
        assert_eq!(
            decode_response(&xml).unwrap(),
            json!([3, 2.5, null, "iVBORw0K"])
        );
    }

    #[test]
    fn decode_empty_array_and_params() {
        assert_eq!(
            decode_response(&wrap("<value><array><data>\n</data></array></value>")).unwrap(),
            json!([])
        );
        assert_eq!(
            decode_response("<methodResponse><params/></methodResponse>").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn decode_fault() {
        let xml = "<?xml version='1.0'?>\n<methodResponse>\n<fault>\n<value><struct>\n<member>\n<name>faultCode</name>\n<value><int>1</int></value>\n</member>\n<member>\n<name>faultString</name>\n<value><string>&lt;class 'Exception'&gt;:boom</string></value>\n</member>\n</struct></value>\n</fault>\n</methodResponse>";
        match decode_response(xml) {
            Err(RpcError::Fault { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "<class 'Exception'>:boom");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn encoded_values_decode_back() {
        let params = json!({"Name": "TK-101", "Height": 8500.0, "Tags": ["a", "b"], "Count": 2});
        let call = encode_call("m", &[params.clone()]);
        // Reuse the value section of the call as a response body.
        let start = call.find("<param>").unwrap() + "<param>".len();
        let end = call.rfind("</param>").unwrap();
        let response = wrap(&call[start..end]);
        assert_eq!(decode_response(&response).unwrap(), params);
    }

    #[test]
    fn reject_garbage() {
        assert!(decode_response("<html><body>502</body></html>").is_err());
        assert!(decode_response(&wrap("<value><int>abc</int></value>")).is_err());
    }
}
