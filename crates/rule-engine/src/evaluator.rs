//! 条件评估器
//!
//! 对上下文做宽松的字符串/数值强制转换后比较。所有畸形输入都退化为 false，
//! 评估过程不会返回错误。

use crate::models::{Condition, ConditionNode, EvaluationContext, LogicalGroup, Predicate};
use crate::operators::{LogicalOperator, Operator};
use regex::Regex;
use serde_json::{Number, Value};
use std::sync::LazyLock;

/// 数值前缀：可选符号，Infinity 或十进制数（可带指数）
static NUMERIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
        .unwrap_or_else(|e| panic!("invalid numeric prefix pattern: {e}"))
});

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件树
    pub fn evaluate(condition: &Condition, context: &EvaluationContext) -> bool {
        match &condition.node {
            ConditionNode::Predicate(predicate) => Self::evaluate_predicate(predicate, context),
            ConditionNode::Group(group) => Self::evaluate_group(group, context),
        }
    }

    fn evaluate_group(group: &LogicalGroup, context: &EvaluationContext) -> bool {
        match group.operator {
            // 空 AND 为真，空 OR 为假
            LogicalOperator::And => group.children.iter().all(|c| Self::evaluate(c, context)),
            LogicalOperator::Or => group.children.iter().any(|c| Self::evaluate(c, context)),
        }
    }

    fn evaluate_predicate(predicate: &Predicate, context: &EvaluationContext) -> bool {
        // 字段缺失时任何操作符都不成立，包括 not_equals
        let Some(actual) = context.get_field(&predicate.field) else {
            return false;
        };
        let expected = predicate.value.as_deref().unwrap_or("");

        Self::compare(actual, predicate.operator, expected)
    }

    /// 单个值与操作数的比较
    pub fn compare(actual: &Value, operator: Operator, expected: &str) -> bool {
        match operator {
            Operator::Equals => to_js_string(actual) == expected,
            Operator::NotEquals => to_js_string(actual) != expected,
            // NaN 参与的比较恒为 false
            Operator::GreaterThan => parse_float(&to_js_string(actual)) > parse_float(expected),
            Operator::LessThan => parse_float(&to_js_string(actual)) < parse_float(expected),
            Operator::Contains => to_js_string(actual).contains(expected),
            Operator::Unknown => false,
        }
    }
}

/// 按 JavaScript `String(value)` 的规则把 JSON 值转成字符串
pub fn to_js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_js_string(n),
        Value::String(s) => s.clone(),
        // 数组逐项转换后逗号拼接，null 元素为空串
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn number_to_js_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }

    let f = n.as_f64().unwrap_or(f64::NAN);
    format_js_float(f)
}

fn format_js_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if f == 0.0 {
        // -0 也输出 "0"
        return "0".to_string();
    }

    let abs = f.abs();
    if abs >= 1e21 || abs < 1e-6 {
        // 指数形式，正指数带 "+"
        let formatted = format!("{f:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }

    f.to_string()
}

/// 按 JavaScript `parseFloat` 的规则解析前导数值，无法解析时返回 NaN
pub fn parse_float(input: &str) -> f64 {
    let trimmed = input.trim_start();
    NUMERIC_PREFIX
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}
