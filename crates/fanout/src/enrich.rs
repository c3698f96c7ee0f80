//! 필드 보강: 정적 필드, 템플릿 필드, 대괄호 키 치환
//!
//! 적용 순서:
//! 1. 정적 필드 주입 (키 충돌 시 덮어씀)
//! 2. 템플릿 필드 평가 후 주입 (평가 실패 시 로그만 남기고 해당 필드는 생략)
//! 3. `bracket_replacer`가 설정되어 있으면 모든 키의 `[`를 치환하고 `]`를 제거
//!
//! 템플릿의 변수 컨텍스트는 `outputFields`에서 템플릿 필드 키를 뺀 맵입니다.
//! 그래서 같은 설정을 두 번 적용해도 결과 맵이 같습니다.
//! 템플릿 필드가 자기와 같은 이름의 upstream 필드를 참조하면(`PodName = "{{ .PodName }}-x"`)
//! 평가에 실패하고 upstream 값도 사라집니다. 새 키 이름을 사용하세요.

use std::collections::HashSet;

use sidewatch_core::config::EnrichmentConfig;
use sidewatch_core::event::{FieldValue, OutputFields};
use tracing::warn;

use crate::error::FanoutError;
use crate::template::Template;

/// 컴파일된 보강 설정
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    custom: Vec<(String, FieldValue)>,
    templated: Vec<(String, Template)>,
    /// 템플릿 컨텍스트에서 제외할 키 (원래 키 + 치환된 키)
    excluded: HashSet<String>,
    bracket_replacer: Option<String>,
}

impl Enricher {
    /// 설정에서 보강기를 생성합니다. 템플릿 컴파일 실패는 에러입니다.
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, FanoutError> {
        let bracket_replacer =
            (!config.bracket_replacer.is_empty()).then(|| config.bracket_replacer.clone());

        let custom = config
            .custom_fields
            .iter()
            .map(|(k, v)| (k.clone(), FieldValue::Text(v.clone())))
            .collect();

        let mut templated = Vec::with_capacity(config.templated_fields.len());
        for (field, source) in &config.templated_fields {
            let template = Template::compile(source).map_err(|reason| FanoutError::Template {
                field: field.clone(),
                reason,
            })?;
            templated.push((field.clone(), template));
        }

        let mut excluded = HashSet::new();
        for (field, _) in &templated {
            excluded.insert(field.clone());
            if let Some(replacer) = &bracket_replacer {
                excluded.insert(replace_brackets(field, replacer));
            }
        }

        for (field, template) in &templated {
            for key in template.fields().filter(|k| excluded.contains(*k)) {
                warn!(
                    field = field.as_str(),
                    references = key,
                    "templated field references another templated field and will never resolve"
                );
            }
        }

        Ok(Self {
            custom,
            templated,
            excluded,
            bracket_replacer,
        })
    }

    /// 보강 설정이 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.custom.is_empty() && self.templated.is_empty() && self.bracket_replacer.is_none()
    }

    /// `outputFields`에 보강을 적용합니다.
    pub fn apply(&self, fields: &mut OutputFields) {
        for (key, value) in &self.custom {
            fields.insert(key.clone(), value.clone());
        }

        if !self.templated.is_empty() {
            let context: &OutputFields = fields;
            let rendered: Vec<(String, Option<String>)> = self
                .templated
                .iter()
                .map(|(field, template)| {
                    let lookup = |k: &str| {
                        if self.excluded.contains(k) {
                            None
                        } else {
                            context.get(k)
                        }
                    };
                    match template.render(lookup) {
                        Ok(value) => (field.clone(), Some(value)),
                        Err(reason) => {
                            warn!(
                                field = field.as_str(),
                                reason = %reason,
                                "templated field evaluation failed"
                            );
                            (field.clone(), None)
                        }
                    }
                })
                .collect();

            for (field, value) in rendered {
                match value {
                    Some(v) => {
                        fields.insert(field, FieldValue::Text(v));
                    }
                    None => {
                        fields.remove(&field);
                    }
                }
            }
        }

        if let Some(replacer) = &self.bracket_replacer {
            if fields.keys().any(|k| k.contains('[') || k.contains(']')) {
                let old = std::mem::take(fields);
                for (key, value) in old {
                    fields.insert(replace_brackets(&key, replacer), value);
                }
            }
        }
    }
}

fn replace_brackets(key: &str, replacer: &str) -> String {
    key.replace('[', replacer).replace(']', "")
}
