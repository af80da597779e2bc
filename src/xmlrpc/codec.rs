//! XML-RPC wire codec over `serde_json::Value`.
//!
//! Requests are assembled as text; replies are pull-parsed with `quick-xml`.
//! The value model is the crate-wide generic JSON value, so decoded replies
//! flow through the same accessors as the JSON-RPC variant.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Number, Value};

use crate::error::RpcError;

/// Serialize a `<methodCall>` document with one `<param>` per value.
pub(crate) fn encode_call(method: &str, params: &[Value]) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\"?>");
    xml.push_str("<methodCall>");
    xml.push_str(&format!("<methodName>{}</methodName>", escape_xml(method)));
    xml.push_str("<params>");
    for param in params {
        xml.push_str("<param>");
        encode_value(&mut xml, param);
        xml.push_str("</param>");
    }
    xml.push_str("</params></methodCall>");
    xml
}

fn encode_value(xml: &mut String, value: &Value) {
    xml.push_str("<value>");
    match value {
        Value::Null => xml.push_str("<nil/>"),
        Value::Bool(flag) => {
            xml.push_str(&format!("<boolean>{}</boolean>", if *flag { 1 } else { 0 }));
        }
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                xml.push_str(&format!("<int>{int}</int>"));
            } else {
                xml.push_str(&format!("<double>{number}</double>"));
            }
        }
        Value::String(text) => {
            xml.push_str(&format!("<string>{}</string>", escape_xml(text)));
        }
        Value::Array(items) => {
            xml.push_str("<array><data>");
            for item in items {
                encode_value(xml, item);
            }
            xml.push_str("</data></array>");
        }
        Value::Object(members) => {
            xml.push_str("<struct>");
            for (name, member) in members {
                xml.push_str(&format!("<member><name>{}</name>", escape_xml(name)));
                encode_value(xml, member);
                xml.push_str("</member>");
            }
            xml.push_str("</struct>");
        }
    }
    xml.push_str("</value>");
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Parse a `<methodResponse>` document into its single value, mapping a
/// `<fault>` to [`RpcError::Fault`].
pub(crate) fn decode_response(body: &str) -> Result<Value, RpcError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut in_fault = false;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(tag) => match tag.name().as_ref() {
                b"fault" => in_fault = true,
                b"value" => {
                    let value = read_value(&mut reader)?;
                    return if in_fault { Err(fault_from(&value)) } else { Ok(value) };
                }
                _ => {}
            },
            Event::Eof => return Err(RpcError::Xml("reply carries no value".to_string())),
            _ => {}
        }
    }
}

fn fault_from(value: &Value) -> RpcError {
    RpcError::Fault {
        code: value.get("faultCode").and_then(Value::as_i64).unwrap_or(0),
        message: value
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or("unknown fault")
            .to_string(),
    }
}

/// Read the content of a `<value>` element; the opening tag has already been
/// consumed. Bare text with no type tag decodes as a string.
fn read_value(reader: &mut Reader<&[u8]>) -> Result<Value, RpcError> {
    let mut typed: Option<Value> = None;
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(tag) => {
                let name = tag.name().as_ref().to_vec();
                typed = Some(match name.as_slice() {
                    b"array" => read_array(reader)?,
                    b"struct" => read_struct(reader)?,
                    b"int" | b"i4" | b"i8" | b"boolean" | b"double" | b"string"
                    | b"dateTime.iso8601" | b"base64" => read_scalar(reader, &name)?,
                    other => {
                        return Err(RpcError::Xml(format!(
                            "unsupported value type <{}>",
                            String::from_utf8_lossy(other)
                        )));
                    }
                });
            }
            Event::Empty(tag) => match tag.name().as_ref() {
                b"nil" => typed = Some(Value::Null),
                b"string" => typed = Some(Value::String(String::new())),
                _ => {}
            },
            Event::Text(chunk) => text.push_str(&chunk.unescape().map_err(xml_err)?),
            Event::End(tag) if tag.name().as_ref() == b"value" => {
                return Ok(typed.unwrap_or(Value::String(text)));
            }
            Event::Eof => return Err(RpcError::Xml("unterminated value".to_string())),
            _ => {}
        }
    }
}

fn read_scalar(reader: &mut Reader<&[u8]>, tag: &[u8]) -> Result<Value, RpcError> {
    let text = read_text_until(reader, tag)?;
    let trimmed = text.trim();
    match tag {
        b"int" | b"i4" | b"i8" => trimmed
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| RpcError::Xml(format!("invalid integer '{trimmed}'"))),
        b"boolean" => Ok(Value::Bool(trimmed == "1" || trimmed.eq_ignore_ascii_case("true"))),
        b"double" => trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| RpcError::Xml(format!("invalid double '{trimmed}'"))),
        // string, dateTime.iso8601 and base64 stay textual
        _ => Ok(Value::String(text)),
    }
}

fn read_array(reader: &mut Reader<&[u8]>) -> Result<Value, RpcError> {
    let mut items = Vec::new();
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(tag) if tag.name().as_ref() == b"value" => {
                items.push(read_value(reader)?);
            }
            Event::Empty(tag) if tag.name().as_ref() == b"value" => {
                items.push(Value::String(String::new()));
            }
            Event::End(tag) if tag.name().as_ref() == b"array" => {
                return Ok(Value::Array(items));
            }
            Event::Eof => return Err(RpcError::Xml("unterminated array".to_string())),
            _ => {}
        }
    }
}

fn read_struct(reader: &mut Reader<&[u8]>) -> Result<Value, RpcError> {
    let mut members = Map::new();
    let mut name: Option<String> = None;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(tag) => match tag.name().as_ref() {
                b"member" => name = None,
                b"name" => name = Some(read_text_until(reader, b"name")?),
                b"value" => {
                    let value = read_value(reader)?;
                    members.insert(name.take().unwrap_or_default(), value);
                }
                _ => {}
            },
            Event::End(tag) if tag.name().as_ref() == b"struct" => {
                return Ok(Value::Object(members));
            }
            Event::Eof => return Err(RpcError::Xml("unterminated struct".to_string())),
            _ => {}
        }
    }
}

fn read_text_until(reader: &mut Reader<&[u8]>, tag: &[u8]) -> Result<String, RpcError> {
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Text(chunk) => text.push_str(&chunk.unescape().map_err(xml_err)?),
            Event::End(end) if end.name().as_ref() == tag => return Ok(text),
            Event::Eof => {
                return Err(RpcError::Xml(format!(
                    "unterminated <{}>",
                    String::from_utf8_lossy(tag)
                )));
            }
            _ => {}
        }
    }
}

fn xml_err(err: impl std::fmt::Display) -> RpcError {
    RpcError::Xml(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_an_authenticate_call() {
        let xml = encode_call(
            "authenticate",
            &[json!("prod"), json!("admin"), json!("s3cret"), json!({})],
        );
        assert!(xml.starts_with("<?xml version=\"1.0\"?><methodCall>"));
        assert!(xml.contains("<methodName>authenticate</methodName>"));
        assert!(xml.contains("<value><string>prod</string></value>"));
        assert!(xml.contains("<value><struct></struct></value>"));
        assert!(xml.ends_with("</params></methodCall>"));
    }

    #[test]
    fn encodes_every_value_kind() {
        let mut xml = String::new();
        encode_value(
            &mut xml,
            &json!({"active": false, "count": 3, "ratio": 0.5, "tags": ["a"], "gone": null}),
        );
        assert!(xml.contains("<member><name>active</name><value><boolean>0</boolean></value></member>"));
        assert!(xml.contains("<member><name>count</name><value><int>3</int></value></member>"));
        assert!(xml.contains("<member><name>ratio</name><value><double>0.5</double></value></member>"));
        assert!(xml.contains("<array><data><value><string>a</string></value></data></array>"));
        assert!(xml.contains("<member><name>gone</name><value><nil/></value></member>"));
    }

    #[test]
    fn escapes_markup_in_text() {
        let mut xml = String::new();
        encode_value(&mut xml, &json!("a < b & \"c\""));
        assert!(xml.contains("<string>a &lt; b &amp; &quot;c&quot;</string>"));
        assert!(!xml.contains("a < b"));
    }

    #[test]
    fn decodes_scalars() {
        let uid = decode_response(
            "<?xml version=\"1.0\"?><methodResponse><params><param><value><int>7</int></value></param></params></methodResponse>",
        )
        .unwrap();
        assert_eq!(uid, json!(7));

        let denied = decode_response(
            "<methodResponse><params><param><value><boolean>0</boolean></value></param></params></methodResponse>",
        )
        .unwrap();
        assert_eq!(denied, json!(false));

        // a bare value with no type tag is a string
        let untyped = decode_response(
            "<methodResponse><params><param><value>hello</value></param></params></methodResponse>",
        )
        .unwrap();
        assert_eq!(untyped, json!("hello"));
    }

    #[test]
    fn decodes_nested_structures() {
        let body = "<methodResponse><params><param><value><array><data>\
                    <value><struct>\
                    <member><name>id</name><value><int>1</int></value></member>\
                    <member><name>name</name><value><string>Azure Interior</string></value></member>\
                    <member><name>email</name><value><boolean>0</boolean></value></member>\
                    </struct></value>\
                    <value><i4>42</i4></value>\
                    </data></array></value></param></params></methodResponse>";
        let value = decode_response(body).unwrap();
        assert_eq!(
            value,
            json!([{"id": 1, "name": "Azure Interior", "email": false}, 42])
        );
    }

    #[test]
    fn decodes_a_fault() {
        let body = "<methodResponse><fault><value><struct>\
                    <member><name>faultCode</name><value><int>2</int></value></member>\
                    <member><name>faultString</name><value><string>Access Denied</string></value></member>\
                    </struct></value></fault></methodResponse>";
        match decode_response(body) {
            Err(RpcError::Fault { code, message }) => {
                assert_eq!(code, 2);
                assert_eq!(message, "Access Denied");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode_response("<methodResponse></methodResponse>"), Err(RpcError::Xml(_))));
        assert!(matches!(
            decode_response("<methodResponse><params><param><value><int>x</int></value></param></params></methodResponse>"),
            Err(RpcError::Xml(_))
        ));
    }
}
