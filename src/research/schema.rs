//! 动态动作 Schema：按当前允许的动作集合生成 `oneOf` JSON Schema，并校验 Oracle 的回复
//!
//! 每个变体的 Schema 由 schemars 从载荷结构体生成，再注入 `action` 判别字段；
//! 各变体的 definitions 合并到根上，保证 `$ref` 可解析。

use schemars::{schema_for, JsonSchema};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::core::AgentError;
use crate::research::action::{
    ActionKind, AnswerAction, CodingAction, ReflectAction, SearchAction, StepAction, VisitAction,
};

/// 五个动作开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionPermissions {
    pub search: bool,
    pub visit: bool,
    pub reflect: bool,
    pub answer: bool,
    pub coding: bool,
}

impl ActionPermissions {
    pub fn all(allow_coding: bool) -> Self {
        Self {
            search: true,
            visit: true,
            reflect: true,
            answer: true,
            coding: allow_coding,
        }
    }

    /// 强制收尾时只允许 answer
    pub fn answer_only() -> Self {
        Self {
            search: false,
            visit: false,
            reflect: false,
            answer: true,
            coding: false,
        }
    }

    pub fn allows(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Search => self.search,
            ActionKind::Visit => self.visit,
            ActionKind::Reflect => self.reflect,
            ActionKind::Answer => self.answer,
            ActionKind::Coding => self.coding,
        }
    }

    pub fn set(&mut self, kind: ActionKind, allowed: bool) {
        match kind {
            ActionKind::Search => self.search = allowed,
            ActionKind::Visit => self.visit = allowed,
            ActionKind::Reflect => self.reflect = allowed,
            ActionKind::Answer => self.answer = allowed,
            ActionKind::Coding => self.coding = allowed,
        }
    }

    pub fn allowed_kinds(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|k| self.allows(*k))
            .collect()
    }

    pub fn any(&self) -> bool {
        ActionKind::ALL.iter().any(|k| self.allows(*k))
    }
}

fn variant_schema<T: JsonSchema>(kind: ActionKind, definitions: &mut Map<String, Value>) -> Value {
    let mut schema = serde_json::to_value(schema_for!(T)).unwrap_or_default();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        if let Some(Value::Object(defs)) = obj.remove("definitions") {
            definitions.extend(defs);
        }
        if let Some(props) = obj
            .entry("properties")
            .or_insert_with(|| json!({}))
            .as_object_mut()
        {
            props.insert(
                "action".to_string(),
                json!({ "type": "string", "enum": [kind.as_str()] }),
            );
        }
        if let Some(required) = obj
            .entry("required")
            .or_insert_with(|| json!([]))
            .as_array_mut()
        {
            required.insert(0, json!("action"));
        }
    }
    schema
}

/// 某一步的动作 Schema 与对应的允许集合
#[derive(Debug, Clone)]
pub struct ActionSchema {
    permissions: ActionPermissions,
    schema: Value,
}

impl ActionSchema {
    pub fn new(permissions: ActionPermissions) -> Self {
        let mut definitions = Map::new();
        let variants: Vec<Value> = permissions
            .allowed_kinds()
            .into_iter()
            .map(|kind| match kind {
                ActionKind::Search => variant_schema::<SearchAction>(kind, &mut definitions),
                ActionKind::Visit => variant_schema::<VisitAction>(kind, &mut definitions),
                ActionKind::Reflect => variant_schema::<ReflectAction>(kind, &mut definitions),
                ActionKind::Answer => variant_schema::<AnswerAction>(kind, &mut definitions),
                ActionKind::Coding => variant_schema::<CodingAction>(kind, &mut definitions),
            })
            .collect();

        let mut schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "StepAction",
            "oneOf": variants,
        });
        if !definitions.is_empty() {
            schema["definitions"] = Value::Object(definitions);
        }
        Self { permissions, schema }
    }

    pub fn permissions(&self) -> ActionPermissions {
        self.permissions
    }

    pub fn as_value(&self) -> &Value {
        &self.schema
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.schema).unwrap_or_default()
    }

    /// 回复的变体必须在允许集合内
    pub fn validate(&self, action: &StepAction) -> Result<(), AgentError> {
        if self.permissions.allows(action.kind()) {
            return Ok(());
        }
        Err(AgentError::SchemaMismatch {
            action: action.kind().to_string(),
            allowed: self
                .permissions
                .allowed_kinds()
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}
