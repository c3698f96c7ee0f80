//! templated field용 최소 템플릿 엔진
//!
//! 지원 문법:
//! - `{{ .Key }}`: 식별자 형태의 키 조회
//! - `{{ index . "key.with.dots" }}`: 임의 문자열 키 조회
//!
//! - `{{- ... }}` / `{{ ... -}}`: 앞/뒤 리터럴의 공백 제거
//!
//! 그 외 액션은 컴파일 에러이며, 없는 키를 조회하면 평가 에러입니다.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;
use sidewatch_core::event::FieldValue;

/// 템플릿 구문 정규식 모음
struct Syntax {
    action: Regex,
    dot_field: Regex,
    index_field: Regex,
}

impl Syntax {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            action: Regex::new(r"\{\{(-\s)?\s*(.*?)\s*(\s-)?\}\}")?,
            dot_field: Regex::new(r"^\.([A-Za-z_][A-Za-z0-9_]*)$")?,
            index_field: Regex::new(r#"^index\s+\.\s+"([^"]*)"$"#)?,
        })
    }
}

static SYNTAX: LazyLock<Result<Syntax, regex::Error>> = LazyLock::new(Syntax::new);

fn syntax() -> Result<&'static Syntax, String> {
    SYNTAX.as_ref().map_err(|e| format!("template syntax unavailable: {e}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// 컴파일된 템플릿
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// 템플릿 문자열을 컴파일합니다.
    pub fn compile(source: &str) -> Result<Self, String> {
        let syntax = syntax()?;
        let mut segments = Vec::new();
        let mut last = 0;
        let mut trim_next = false;

        for caps in syntax.action.captures_iter(source) {
            let (Some(whole), Some(action)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let mut text = &source[last..whole.start()];
            if trim_next {
                text = text.trim_start();
            }
            if caps.get(1).is_some() {
                text = text.trim_end();
            }
            push_literal(&mut segments, text)?;
            segments.push(Segment::Field(parse_action(syntax, action.as_str())?));
            trim_next = caps.get(3).is_some();
            last = whole.end();
        }
        let tail = &source[last..];
        push_literal(&mut segments, if trim_next { tail.trim_start() } else { tail })?;

        Ok(Self { segments })
    }

    /// 참조하는 키 목록
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(key) => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// `lookup`으로 키를 조회하여 템플릿을 평가합니다.
    pub fn render<'a>(
        &self,
        lookup: impl Fn(&str) -> Option<&'a FieldValue>,
    ) -> Result<String, String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(key) => {
                    let value = lookup(key)
                        .ok_or_else(|| format!("map has no entry for key \"{key}\""))?;
                    let _ = write!(out, "{value}");
                }
            }
        }
        Ok(out)
    }
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) -> Result<(), String> {
    if text.contains("{{") {
        return Err("unclosed action".to_owned());
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_owned()));
    }
    Ok(())
}

fn parse_action(syntax: &Syntax, action: &str) -> Result<String, String> {
    if let Some(caps) = syntax.dot_field.captures(action) {
        return Ok(caps[1].to_owned());
    }
    if let Some(caps) = syntax.index_field.captures(action) {
        return Ok(caps[1].to_owned());
    }
    Err(format!("unsupported action \"{action}\""))
}
