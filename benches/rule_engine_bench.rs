//! 规则引擎性能基准测试
//!
//! 测试覆盖：
//! - 简单条件评估性能
//! - AND 组合与深层嵌套条件树
//! - 多规则引擎批量评估
//! - 各操作符的强制转换开销

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rule_engine::{
    Action, ActionType, Condition, ConditionEvaluator, EvaluationContext, LogicalOperator,
    Operator, Rule, RuleEngine,
};
use serde_json::json;
use std::hint::black_box;

/// 创建 AND 组合条件
fn create_and_condition(conditions_count: usize) -> Condition {
    Condition::and(
        (0..conditions_count)
            .map(|i| Condition::predicate(format!("field_{i}"), Operator::Equals, format!("value_{i}")))
            .collect(),
    )
}

/// 创建嵌套条件树（AND/OR 交替）
fn create_nested_condition(depth: usize, breadth: usize) -> Condition {
    fn build(depth: usize, breadth: usize, level: usize) -> Condition {
        if depth == 0 {
            return Condition::predicate(
                format!("field_{level}"),
                Operator::Equals,
                format!("value_{level}"),
            );
        }

        let operator = if depth % 2 == 0 {
            LogicalOperator::And
        } else {
            LogicalOperator::Or
        };
        Condition::group(
            operator,
            (0..breadth).map(|i| build(depth - 1, breadth, i)).collect(),
        )
    }

    build(depth, breadth, 0)
}

/// 典型推荐奖励规则
fn create_referral_rule(id: usize, threshold: u64) -> Rule {
    Rule::new(format!("rule-{id}"), format!("Referral tier {id}"))
        .with_condition(Condition::predicate("event", Operator::Equals, "purchase"))
        .with_condition(Condition::predicate(
            "amount",
            Operator::GreaterThan,
            threshold.to_string(),
        ))
        .with_condition(Condition::or(vec![
            Condition::predicate("tier", Operator::Equals, "gold"),
            Condition::predicate("email", Operator::Contains, "@example.com"),
        ]))
        .with_action(Action::reward(10))
        .with_action(Action::new(ActionType::Notification, json!({})))
}

fn create_matching_context() -> EvaluationContext {
    EvaluationContext::new(json!({
        "event": "purchase",
        "amount": 5000,
        "tier": "silver",
        "email": "friend@example.com",
        "referrer": "user-123"
    }))
}

/// 创建包含多字段的大型上下文
fn create_large_context(field_count: usize) -> EvaluationContext {
    let mut ctx = create_matching_context();
    for i in 0..field_count {
        ctx.insert(format!("field_{i}"), format!("value_{i}"));
    }
    ctx
}

// ============================================================================
// 基准测试函数
// ============================================================================

/// 简单条件评估基准
fn bench_simple_condition(c: &mut Criterion) {
    let condition = Condition::predicate("event", Operator::Equals, "purchase");
    let context = create_matching_context();

    c.bench_function("simple_condition_evaluation", |b| {
        b.iter(|| ConditionEvaluator::evaluate(black_box(&condition), black_box(&context)))
    });
}

/// AND 组合条件评估基准（不同条件数量）
fn bench_and_conditions(c: &mut Criterion) {
    let mut group = c.benchmark_group("and_conditions");

    for conditions_count in [2, 5, 10, 20, 50] {
        let condition = create_and_condition(conditions_count);
        let context = create_large_context(conditions_count);

        group.throughput(Throughput::Elements(conditions_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(conditions_count),
            &conditions_count,
            |b, _| b.iter(|| ConditionEvaluator::evaluate(black_box(&condition), black_box(&context))),
        );
    }

    group.finish();
}

/// 嵌套条件树评估基准
fn bench_nested_conditions(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_conditions");
    let context = create_large_context(10);

    for (depth, breadth) in [(2, 3), (3, 3), (4, 3), (5, 2)] {
        let condition = create_nested_condition(depth, breadth);
        group.bench_with_input(
            BenchmarkId::new("depth_breadth", format!("{depth}x{breadth}")),
            &(depth, breadth),
            |b, _| b.iter(|| ConditionEvaluator::evaluate(black_box(&condition), black_box(&context))),
        );
    }

    group.finish();
}

/// 多规则引擎评估基准
fn bench_engine_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_evaluation");
    let context = create_matching_context();

    for rule_count in [1, 10, 100, 500] {
        let engine = RuleEngine::with_rules(
            (0..rule_count)
                .map(|i| create_referral_rule(i, (i as u64) * 20))
                .collect(),
        );

        group.throughput(Throughput::Elements(rule_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rule_count), &rule_count, |b, _| {
            b.iter(|| black_box(engine.evaluate(black_box(&context))))
        });
    }

    group.finish();
}

/// 操作符基准：字符串强制转换与浮点解析
fn bench_operators(c: &mut Criterion) {
    let mut group = c.benchmark_group("operators");
    let context = EvaluationContext::new(json!({
        "amount": 1234.5,
        "count": 5,
        "email": "someone.with.a.long.name@example.com",
        "tags": ["new", "vip", "gold"]
    }));

    let cases = [
        ("equals_number", Condition::predicate("count", Operator::Equals, "5")),
        ("greater_than", Condition::predicate("amount", Operator::GreaterThan, "1000")),
        ("less_than", Condition::predicate("amount", Operator::LessThan, "1e4")),
        ("contains_string", Condition::predicate("email", Operator::Contains, "@example.com")),
        ("contains_array", Condition::predicate("tags", Operator::Contains, "vip")),
        ("missing_field", Condition::predicate("absent", Operator::NotEquals, "x")),
    ];

    for (name, condition) in cases {
        group.bench_function(name, |b| {
            b.iter(|| ConditionEvaluator::evaluate(black_box(&condition), black_box(&context)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_simple_condition,
    bench_and_conditions,
    bench_nested_conditions,
    bench_engine_evaluation,
    bench_operators,
);

criterion_main!(benches);
