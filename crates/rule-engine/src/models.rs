//! 规则引擎领域模型
//!
//! 条件树采用递归和类型：叶子谓词或 AND/OR 组合。
//! 对外 JSON 仍是扁平结构 `{id, type, field, operator, value, children}`，
//! 由 [`ConditionDef`] 负责与领域模型互转。

use crate::evaluator::to_js_string;
use crate::operators::{LogicalOperator, Operator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 条件语义标签
///
/// 仅用于展示和分类，不参与评估
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    UserProperty,
    EventType,
    Amount,
    Date,
    #[default]
    #[serde(other)]
    Custom,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserProperty => "user_property",
            Self::EventType => "event_type",
            Self::Amount => "amount",
            Self::Date => "date",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "user_property" => Self::UserProperty,
            "event_type" => Self::EventType,
            "amount" => Self::Amount,
            "date" => Self::Date,
            _ => Self::Custom,
        }
    }
}

/// 条件节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConditionDef", into = "ConditionDef")]
pub struct Condition {
    pub id: String,
    pub condition_type: ConditionType,
    pub node: ConditionNode,
}

/// 条件节点主体
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    Predicate(Predicate),
    Group(LogicalGroup),
}

/// 叶子谓词：`context[field] <operator> value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: Option<String>,
}

/// 逻辑组节点
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalGroup {
    pub operator: LogicalOperator,
    pub children: Vec<Condition>,
}

impl Condition {
    /// 创建叶子条件
    pub fn predicate(
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            condition_type: ConditionType::Custom,
            node: ConditionNode::Predicate(Predicate {
                field: field.into(),
                operator,
                value: Some(value.into()),
            }),
        }
    }

    pub fn and(children: Vec<Condition>) -> Self {
        Self::group(LogicalOperator::And, children)
    }

    pub fn or(children: Vec<Condition>) -> Self {
        Self::group(LogicalOperator::Or, children)
    }

    pub fn group(operator: LogicalOperator, children: Vec<Condition>) -> Self {
        Self {
            id: String::new(),
            condition_type: ConditionType::Custom,
            node: ConditionNode::Group(LogicalGroup { operator, children }),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_type(mut self, condition_type: ConditionType) -> Self {
        self.condition_type = condition_type;
        self
    }

    /// 线上存储使用的操作符字符串
    pub fn operator_str(&self) -> &'static str {
        match &self.node {
            ConditionNode::Predicate(p) => p.operator.as_str(),
            ConditionNode::Group(g) => g.operator.as_str(),
        }
    }

    /// 深度优先遍历（含自身）
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Condition)) {
        visit(self);
        if let ConditionNode::Group(group) = &self.node {
            for child in &group.children {
                child.walk(visit);
            }
        }
    }

    /// 可变深度优先遍历（含自身）
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Condition)) {
        visit(self);
        if let ConditionNode::Group(group) = &mut self.node {
            for child in &mut group.children {
                child.walk_mut(visit);
            }
        }
    }
}

/// 条件的扁平线上表示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDef {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub condition_type: ConditionType,
    #[serde(default)]
    pub field: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ConditionDef>,
}

impl From<ConditionDef> for Condition {
    fn from(def: ConditionDef) -> Self {
        let node = match LogicalOperator::parse(&def.operator) {
            Some(operator) => ConditionNode::Group(LogicalGroup {
                operator,
                children: def.children.into_iter().map(Condition::from).collect(),
            }),
            None => ConditionNode::Predicate(Predicate {
                field: def.field,
                // FromStr 不会失败，未知操作符落入 Unknown
                operator: def.operator.parse().unwrap_or(Operator::Unknown),
                value: match def.value {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(to_js_string(&v)),
                },
            }),
        };

        Self {
            id: def.id,
            condition_type: def.condition_type,
            node,
        }
    }
}

impl From<Condition> for ConditionDef {
    fn from(condition: Condition) -> Self {
        match condition.node {
            ConditionNode::Predicate(p) => Self {
                id: condition.id,
                condition_type: condition.condition_type,
                field: p.field,
                operator: p.operator.as_str().to_string(),
                value: p.value.map(Value::String),
                children: Vec::new(),
            },
            ConditionNode::Group(g) => Self {
                id: condition.id,
                condition_type: condition.condition_type,
                field: String::new(),
                operator: g.operator.as_str().to_string(),
                value: None,
                children: g.children.into_iter().map(ConditionDef::from).collect(),
            },
        }
    }
}

/// 评估上下文 - 扁平的字段名到值映射
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    data: Map<String, Value>,
}

impl EvaluationContext {
    pub fn new(data: Value) -> Self {
        match data {
            Value::Object(data) => Self { data },
            _ => Self::default(),
        }
    }

    /// 从 JSON 对象创建
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let data: Map<String, Value> = serde_json::from_str(json)?;
        Ok(Self { data })
    }

    /// 获取字段值（按完整键名查找，不解析点号路径）
    pub fn get_field(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(field.into(), value.into());
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

impl From<Map<String, Value>> for EvaluationContext {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}
