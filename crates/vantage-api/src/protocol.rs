//! Line framing for the host command protocol.
//!
//! Every frame is one newline-terminated line of whitespace-separated
//! tokens. Tokens containing whitespace are wrapped in double quotes,
//! and a literal quote inside a quoted token is doubled (`""`).
//!
//! ```text
//! INVOKE 447 Button.GetState
//! R:INVOKE 447 1 Button.GetState
//! R:ERROR:4 Invalid Parameter
//! S:BTN 447 PRESS
//! EL: 447 Button.GetState 1
//! ```

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::error::Error;

/// Split a line into tokens, honouring double-quoted tokens.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.trim().chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        if c == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        token.push('"');
                    } else {
                        break;
                    }
                } else {
                    token.push(c);
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    tokens
}

/// Quote a single argument for the wire if it would not survive tokenizing.
pub fn quote(arg: &str) -> Cow<'_, str> {
    if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || c == '"') {
        return Cow::Borrowed(arg);
    }
    Cow::Owned(format!("\"{}\"", arg.replace('"', "\"\"")))
}

/// Format an `INVOKE` request line (without the trailing newline).
pub fn format_invoke<S: AsRef<str>>(vid: u32, method: &str, args: &[S]) -> String {
    let mut line = format!("INVOKE {vid} {method}");
    for arg in args {
        let _ = write!(line, " {}", quote(arg.as_ref()));
    }
    line
}

/// A classified inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `R:<VERB> <tokens...>` -- a reply to the outstanding request.
    Reply { verb: String, tokens: Vec<String> },
    /// `R:ERROR:<code> <message>` or `R:ERROR <code> <message>`.
    Error { code: i32, message: String },
    /// `S:<CATEGORY> <tokens...>` -- a pushed status line.
    Status {
        category: String,
        tokens: Vec<String>,
    },
    /// `EL: <tokens...>` -- an enhanced-log record.
    EnhancedLog { tokens: Vec<String> },
    /// Anything else (banners, multi-line response bodies).
    Other(String),
}

impl Frame {
    /// Classify a raw line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("R:ERROR") {
            return parse_error(rest);
        }

        if let Some(rest) = line.strip_prefix("R:") {
            let mut tokens = tokenize(rest);
            if tokens.is_empty() {
                return Self::Other(line.to_owned());
            }
            let verb = tokens.remove(0);
            return Self::Reply { verb, tokens };
        }

        if let Some(rest) = line.strip_prefix("EL:") {
            return Self::EnhancedLog {
                tokens: tokenize(rest),
            };
        }

        if let Some(rest) = line.strip_prefix("S:") {
            let mut tokens = tokenize(rest);
            if tokens.is_empty() {
                return Self::Other(line.to_owned());
            }
            let category = tokens.remove(0);
            return Self::Status { category, tokens };
        }

        Self::Other(line.to_owned())
    }

    /// Returns `true` for frames that terminate a request/response exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reply { .. } | Self::Error { .. })
    }

    /// Returns `true` for unsolicited pushed frames.
    pub fn is_pushed(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::EnhancedLog { .. })
    }
}

fn parse_error(rest: &str) -> Frame {
    let rest = rest.strip_prefix(':').unwrap_or(rest).trim_start();
    let (code_str, message) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let code = code_str.parse().unwrap_or(-1);
    Frame::Error {
        code,
        message: message.trim().to_owned(),
    }
}

/// A decoded `R:INVOKE` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeReply {
    /// Object id echoed by the controller.
    pub vid: u32,
    /// Return value or return code token.
    pub result: String,
    /// `Interface.Method` echoed by the controller.
    pub method: String,
    /// Echoed arguments, if any.
    pub args: Vec<String>,
}

impl InvokeReply {
    /// Build from the tokens following `R:INVOKE`.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self, Error> {
        let mut iter = tokens.into_iter();
        let (Some(vid), Some(result), Some(method)) = (iter.next(), iter.next(), iter.next())
        else {
            return Err(Error::protocol("truncated R:INVOKE reply"));
        };
        let vid = vid
            .parse()
            .map_err(|_| Error::protocol(format!("invalid object id in reply: {vid}")))?;
        Ok(Self {
            vid,
            result,
            method,
            args: iter.collect(),
        })
    }

    /// Interpret the result slot as a void-method return code.
    ///
    /// `0` and `OK` are success; any other integer surfaces as
    /// [`Error::Command`].
    pub fn check_rcode(&self) -> Result<(), Error> {
        if self.result.eq_ignore_ascii_case("ok") {
            return Ok(());
        }
        match self.result.parse::<i32>() {
            Ok(0) => Ok(()),
            Ok(code) => Err(Error::Command {
                code,
                message: format!("{} returned {code}", self.method),
            }),
            Err(_) => Err(Error::conversion(format!(
                "expected return code from {}, got '{}'",
                self.method, self.result
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tokenize_plain_and_quoted() {
        assert_eq!(
            tokenize(r#"R:INVOKE 12 "Kitchen ""Main"" Light" Object.GetName"#),
            vec!["R:INVOKE", "12", r#"Kitchen "Main" Light"#, "Object.GetName"]
        );
        assert_eq!(tokenize("  S:BTN   447 PRESS \r"), vec!["S:BTN", "447", "PRESS"]);
        assert_eq!(tokenize(r#"a "" b"#), vec!["a", "", "b"]);
    }

    #[test]
    fn quote_only_when_needed() {
        assert_eq!(quote("50.000"), "50.000");
        assert_eq!(quote("two words"), "\"two words\"");
        assert_eq!(quote(""), "\"\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn format_invoke_line() {
        assert_eq!(
            format_invoke(447, "Button.SetState", &["1"]),
            "INVOKE 447 Button.SetState 1"
        );
        assert_eq!(
            format_invoke::<&str>(12, "Load.GetLevel", &[]),
            "INVOKE 12 Load.GetLevel"
        );
    }

    #[test]
    fn parse_error_frames() {
        assert_eq!(
            Frame::parse("R:ERROR:4 Invalid Parameter"),
            Frame::Error {
                code: 4,
                message: "Invalid Parameter".into()
            }
        );
        assert_eq!(
            Frame::parse("R:ERROR 7 Object not found"),
            Frame::Error {
                code: 7,
                message: "Object not found".into()
            }
        );
    }

    #[test]
    fn parse_reply_status_and_log_frames() {
        assert_eq!(
            Frame::parse("R:GETLED 447 1 255 0 0 0 0 0 OFF"),
            Frame::Reply {
                verb: "GETLED".into(),
                tokens: ["447", "1", "255", "0", "0", "0", "0", "0", "OFF"]
                    .map(String::from)
                    .to_vec(),
            }
        );
        assert_eq!(
            Frame::parse("S:BTN 447 PRESS"),
            Frame::Status {
                category: "BTN".into(),
                tokens: vec!["447".into(), "PRESS".into()],
            }
        );
        assert!(Frame::parse("EL: 447 Button.GetState 1").is_pushed());
        assert_eq!(
            Frame::parse("Welcome"),
            Frame::Other("Welcome".into())
        );
    }

    #[test]
    fn invoke_reply_decoding() {
        let reply = InvokeReply::from_tokens(
            ["447", "0", "Button.SetState", "1"].map(String::from).to_vec(),
        )
        .unwrap();
        assert_eq!(reply.vid, 447);
        assert_eq!(reply.method, "Button.SetState");
        assert_eq!(reply.args, vec!["1"]);
        reply.check_rcode().unwrap();

        let failed = InvokeReply {
            result: "3".into(),
            ..reply
        };
        assert_eq!(failed.check_rcode().unwrap_err().command_code(), Some(3));
    }

    #[test]
    fn truncated_invoke_reply_is_protocol_error() {
        let err = InvokeReply::from_tokens(vec!["447".into()]).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }
}
