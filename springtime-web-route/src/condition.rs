//! Conditional route registration. A [Conditional] is built one clause at a time and evaluated
//! once, when the application starts, against a [ConditionContext] provided by the host
//! application.
//!
//! Clauses are combined left to right. [Conditional::and] and [Conditional::or] select the
//! combinator for the *next* appended clause only, with AND being the default, so
//! `a.and().b.or().c` means `(a && b) || c`.

pub mod expression;

use crate::condition::expression::Expression;
#[cfg(test)]
use mockall::automock;
use std::any::{type_name, TypeId};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use tracing::warn;

/// Selects a bean (component) in the host dependency injection container.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum BeanSelector {
    /// Select by registered name.
    Name(String),
    /// Select by type.
    Type { id: TypeId, name: &'static str },
}

impl BeanSelector {
    /// Selects beans registered as given type, which can be a concrete type or `dyn Trait`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

impl From<&str> for BeanSelector {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for BeanSelector {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl Display for BeanSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BeanSelector::Name(name) => write!(f, "bean named '{name}'"),
            BeanSelector::Type { name, .. } => write!(f, "bean of type {name}"),
        }
    }
}

/// Application state visible to conditions.
#[cfg_attr(test, automock)]
pub trait ConditionContext {
    /// Returns the value of given property, if present.
    fn property(&self, name: &str) -> Option<String>;

    /// Checks if given property is present, either as a value or as a prefix of other
    /// properties (e.g. `server` when `server.port` is set).
    fn has_property(&self, name: &str) -> bool;

    /// Checks if a bean matching the selector is present.
    fn has_bean(&self, selector: &BeanSelector) -> bool;

    /// Checks if given profile is active.
    fn is_profile_active(&self, profile: &str) -> bool;
}

/// Predicate deciding if a route should be registered.
pub trait Condition: Send + Sync {
    fn matches(&self, context: &dyn ConditionContext) -> bool;
}

pub type ConditionPtr = Arc<dyn Condition>;

/// Passes when the property exists, as a value or as a prefix of other properties.
#[derive(Clone, Debug)]
pub struct PropertyCondition {
    name: String,
}

impl PropertyCondition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Condition for PropertyCondition {
    fn matches(&self, context: &dyn ConditionContext) -> bool {
        context.has_property(&self.name)
    }
}

/// Passes when the property does not exist.
#[derive(Clone, Debug)]
pub struct MissingPropertyCondition {
    name: String,
}

impl MissingPropertyCondition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Condition for MissingPropertyCondition {
    fn matches(&self, context: &dyn ConditionContext) -> bool {
        !context.has_property(&self.name)
    }
}

/// Passes when the property exists and is equal to given value.
#[derive(Clone, Debug)]
pub struct PropertyValueCondition {
    name: String,
    having_value: String,
}

impl PropertyValueCondition {
    pub fn new(name: impl Into<String>, having_value: impl ToString) -> Self {
        Self {
            name: name.into(),
            having_value: having_value.to_string(),
        }
    }
}

impl Condition for PropertyValueCondition {
    fn matches(&self, context: &dyn ConditionContext) -> bool {
        context
            .property(&self.name)
            .map(|value| value == self.having_value)
            .unwrap_or(false)
    }
}

/// Passes when a matching bean exists.
#[derive(Clone, Debug)]
pub struct BeanCondition {
    selector: BeanSelector,
}

impl BeanCondition {
    pub fn new(selector: impl Into<BeanSelector>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

impl Condition for BeanCondition {
    fn matches(&self, context: &dyn ConditionContext) -> bool {
        context.has_bean(&self.selector)
    }
}

/// Passes when no matching bean exists.
#[derive(Clone, Debug)]
pub struct MissingBeanCondition {
    selector: BeanSelector,
}

impl MissingBeanCondition {
    pub fn new(selector: impl Into<BeanSelector>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

impl Condition for MissingBeanCondition {
    fn matches(&self, context: &dyn ConditionContext) -> bool {
        !context.has_bean(&self.selector)
    }
}

/// Passes when the profile is active.
#[derive(Clone, Debug)]
pub struct ProfileCondition {
    profile: String,
}

impl ProfileCondition {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }
}

impl Condition for ProfileCondition {
    fn matches(&self, context: &dyn ConditionContext) -> bool {
        context.is_profile_active(&self.profile)
    }
}

/// Passes when the [Expression] evaluates to true. Invalid expressions never pass.
#[derive(Clone, Debug)]
pub struct ExpressionCondition {
    source: String,
    expression: Result<Expression, expression::ExpressionError>,
}

impl ExpressionCondition {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            expression: Expression::parse(&source),
            source,
        }
    }
}

impl Condition for ExpressionCondition {
    fn matches(&self, context: &dyn ConditionContext) -> bool {
        match &self.expression {
            Ok(expression) => expression.evaluate(context),
            Err(error) => {
                warn!(expression = self.source.as_str(), %error, "Invalid condition expression.");
                false
            }
        }
    }
}

/// Passes when the wrapped function returns true.
pub struct FunctionCondition<F> {
    f: F,
}

impl<F> FunctionCondition<F>
where
    F: Fn(&dyn ConditionContext) -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Condition for FunctionCondition<F>
where
    F: Fn(&dyn ConditionContext) -> bool + Send + Sync,
{
    fn matches(&self, context: &dyn ConditionContext) -> bool {
        (self.f)(context)
    }
}

/// Negates the wrapped condition.
pub struct NotCondition {
    condition: ConditionPtr,
}

impl NotCondition {
    pub fn new<C: Condition + 'static>(condition: C) -> Self {
        Self {
            condition: Arc::new(condition),
        }
    }
}

impl Condition for NotCondition {
    fn matches(&self, context: &dyn ConditionContext) -> bool {
        !self.condition.matches(context)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Combinator {
    And,
    Or,
}

/// Incrementally built condition consisting of clauses combined with AND/OR. See module
/// documentation for evaluation rules. An empty conditional always passes.
#[derive(Clone, Default)]
pub struct Conditional {
    clauses: Vec<(Combinator, ConditionPtr)>,
    next_combinator: Option<Combinator>,
}

impl Debug for Conditional {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conditional")
            .field(
                "combinators",
                &self
                    .clauses
                    .iter()
                    .map(|(combinator, _)| *combinator)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Conditional {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if any clause has been added.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Combines the next clause using OR.
    pub fn or(&mut self) -> &mut Self {
        self.next_combinator = Some(Combinator::Or);
        self
    }

    /// Combines the next clause using AND.
    pub fn and(&mut self) -> &mut Self {
        self.next_combinator = Some(Combinator::And);
        self
    }

    pub fn on_condition<C: Condition + 'static>(&mut self, condition: C) -> &mut Self {
        self.push(Arc::new(condition))
    }

    pub fn on_condition_not<C: Condition + 'static>(&mut self, condition: C) -> &mut Self {
        self.push(Arc::new(NotCondition::new(condition)))
    }

    pub fn on_property(&mut self, name: impl Into<String>) -> &mut Self {
        self.push(Arc::new(PropertyCondition::new(name)))
    }

    pub fn on_missing_property(&mut self, name: impl Into<String>) -> &mut Self {
        self.push(Arc::new(MissingPropertyCondition::new(name)))
    }

    pub fn on_property_value(
        &mut self,
        name: impl Into<String>,
        having_value: impl ToString,
    ) -> &mut Self {
        self.push(Arc::new(PropertyValueCondition::new(name, having_value)))
    }

    pub fn on_bean(&mut self, selector: impl Into<BeanSelector>) -> &mut Self {
        self.push(Arc::new(BeanCondition::new(selector)))
    }

    pub fn on_missing_bean(&mut self, selector: impl Into<BeanSelector>) -> &mut Self {
        self.push(Arc::new(MissingBeanCondition::new(selector)))
    }

    pub fn on_expression(&mut self, expression: impl Into<String>) -> &mut Self {
        self.push(Arc::new(ExpressionCondition::new(expression)))
    }

    pub fn on_matches<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ConditionContext) -> bool + Send + Sync + 'static,
    {
        self.push(Arc::new(FunctionCondition::new(f)))
    }

    pub fn on_profile(&mut self, profile: impl Into<String>) -> &mut Self {
        self.push(Arc::new(ProfileCondition::new(profile)))
    }

    fn push(&mut self, condition: ConditionPtr) -> &mut Self {
        let combinator = self.next_combinator.take().unwrap_or(Combinator::And);
        self.clauses.push((combinator, condition));
        self
    }
}

impl Condition for Conditional {
    fn matches(&self, context: &dyn ConditionContext) -> bool {
        let mut clauses = self.clauses.iter();
        let first = match clauses.next() {
            Some((_, condition)) => condition.matches(context),
            None => return true,
        };

        clauses.fold(first, |result, (combinator, condition)| match combinator {
            Combinator::And => result && condition.matches(context),
            Combinator::Or => result || condition.matches(context),
        })
    }
}

/// Condition builder methods shared by everything holding a [Conditional].
pub trait ConditionBuilder {
    /// Returns the conditional being built.
    fn conditional_mut(&mut self) -> &mut Conditional;

    /// Combines the next clause using OR.
    fn or(&mut self) -> &mut Self {
        self.conditional_mut().or();
        self
    }

    /// Combines the next clause using AND.
    fn and(&mut self) -> &mut Self {
        self.conditional_mut().and();
        self
    }

    fn condition_on<C: Condition + 'static>(&mut self, condition: C) -> &mut Self {
        self.conditional_mut().on_condition(condition);
        self
    }

    fn condition_not<C: Condition + 'static>(&mut self, condition: C) -> &mut Self {
        self.conditional_mut().on_condition_not(condition);
        self
    }

    fn condition_on_property(&mut self, name: impl Into<String>) -> &mut Self {
        self.conditional_mut().on_property(name);
        self
    }

    fn condition_on_missing_property(&mut self, name: impl Into<String>) -> &mut Self {
        self.conditional_mut().on_missing_property(name);
        self
    }

    fn condition_on_property_value(
        &mut self,
        name: impl Into<String>,
        having_value: impl ToString,
    ) -> &mut Self {
        self.conditional_mut().on_property_value(name, having_value);
        self
    }

    fn condition_on_bean(&mut self, selector: impl Into<BeanSelector>) -> &mut Self {
        self.conditional_mut().on_bean(selector);
        self
    }

    fn condition_on_missing_bean(&mut self, selector: impl Into<BeanSelector>) -> &mut Self {
        self.conditional_mut().on_missing_bean(selector);
        self
    }

    fn condition_on_expression(&mut self, expression: impl Into<String>) -> &mut Self {
        self.conditional_mut().on_expression(expression);
        self
    }

    fn condition_on_matches<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ConditionContext) -> bool + Send + Sync + 'static,
    {
        self.conditional_mut().on_matches(f);
        self
    }

    fn condition_on_profile(&mut self, profile: impl Into<String>) -> &mut Self {
        self.conditional_mut().on_profile(profile);
        self
    }
}
