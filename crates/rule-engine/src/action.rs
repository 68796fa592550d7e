//! 动作执行器
//!
//! 动作只描述效果，不直接修改账本。奖励结果由调用方显式写入账本。

use crate::evaluator::to_js_string;
use crate::models::EvaluationContext;
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_REWARD_DESCRIPTION: &str = "Referral reward";
pub const DEFAULT_NOTIFICATION_MESSAGE: &str = "Notification sent";

/// 动作类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Reward,
    Notification,
    Email,
    Webhook,
    #[default]
    #[serde(other)]
    Custom,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reward => "reward",
            Self::Notification => "notification",
            Self::Email => "email",
            Self::Webhook => "webhook",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "reward" => Self::Reward,
            "notification" => Self::Notification,
            "email" => Self::Email,
            "webhook" => Self::Webhook,
            _ => Self::Custom,
        }
    }
}

/// 规则动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Action {
    pub fn new(action_type: ActionType, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: String::new(),
            action_type,
            params,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// 奖励动作
    pub fn reward(amount: impl Into<Value>) -> Self {
        let mut params = Map::new();
        params.insert("amount".to_string(), amount.into());
        Self {
            id: String::new(),
            action_type: ActionType::Reward,
            params,
        }
    }

    pub fn execute(&self, context: &EvaluationContext) -> ActionResult {
        ActionExecutor::execute(self, context)
    }
}

/// 动作执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionResult {
    Reward {
        amount: BigDecimal,
        currency: String,
        description: String,
    },
    Notification {
        message: String,
    },
    Email {
        params: Map<String, Value>,
    },
    Webhook {
        params: Map<String, Value>,
    },
    Custom {
        params: Map<String, Value>,
    },
}

impl ActionResult {
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Reward { .. } => ActionType::Reward,
            Self::Notification { .. } => ActionType::Notification,
            Self::Email { .. } => ActionType::Email,
            Self::Webhook { .. } => ActionType::Webhook,
            Self::Custom { .. } => ActionType::Custom,
        }
    }

    pub fn is_reward(&self) -> bool {
        matches!(self, Self::Reward { .. })
    }
}

/// 动作执行器
pub struct ActionExecutor;

impl ActionExecutor {
    /// 把动作转换为效果描述
    ///
    /// 上下文目前不参与计算，保留在签名中供后续模板化参数使用
    pub fn execute(action: &Action, _context: &EvaluationContext) -> ActionResult {
        match action.action_type {
            ActionType::Reward => ActionResult::Reward {
                amount: Self::amount_param(action.params.get("amount")),
                currency: Self::string_param(&action.params, "currency", DEFAULT_CURRENCY),
                description: Self::string_param(
                    &action.params,
                    "description",
                    DEFAULT_REWARD_DESCRIPTION,
                ),
            },
            ActionType::Notification => ActionResult::Notification {
                message: Self::string_param(
                    &action.params,
                    "message",
                    DEFAULT_NOTIFICATION_MESSAGE,
                ),
            },
            ActionType::Email => ActionResult::Email {
                params: action.params.clone(),
            },
            ActionType::Webhook => ActionResult::Webhook {
                params: action.params.clone(),
            },
            ActionType::Custom => ActionResult::Custom {
                params: action.params.clone(),
            },
        }
    }

    /// 数值或数值字符串，否则为 0
    fn amount_param(value: Option<&Value>) -> BigDecimal {
        let raw = match value {
            Some(Value::Number(n)) => to_js_string(&Value::Number(n.clone())),
            Some(Value::String(s)) => s.trim().to_string(),
            _ => return BigDecimal::zero(),
        };

        BigDecimal::from_str(&raw).unwrap_or_else(|_| BigDecimal::zero())
    }

    /// 取值为假（缺失、null、空串、false、0）时取默认值
    fn string_param(params: &Map<String, Value>, key: &str, default: &str) -> String {
        match params.get(key) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => default.to_string(),
            Some(Value::String(s)) if s.is_empty() => default.to_string(),
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => default.to_string(),
            Some(other) => to_js_string(other),
        }
    }
}
