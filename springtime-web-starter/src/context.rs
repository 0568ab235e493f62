//! Application state used when deciding which routes to bind.

use crate::config::ApplicationProperties;
use fxhash::FxHashMap;
use springtime_di::component_registry::conditional::ComponentDefinitionRegistryFacade;
use springtime_di::component_registry::StaticComponentDefinitionRegistry;
use springtime_web_route::condition::{BeanSelector, ConditionContext};
use springtime_web_route::filter::FilterPtr;

/// Running application as seen by the
/// [WebServerStarter](crate::starter::WebServerStarter): properties, profiles, registered
/// components and named filters.
pub trait ApplicationContext: ConditionContext {
    /// Looks up a filter registered under given name.
    fn filter_by_name(&self, name: &str) -> Option<FilterPtr>;
}

/// [ApplicationContext] backed by [ApplicationProperties] and the component definition registry.
#[derive(Clone, Default)]
pub struct SpringtimeApplicationContext {
    properties: ApplicationProperties,
    filters: FxHashMap<String, FilterPtr>,
    registry: Option<StaticComponentDefinitionRegistry>,
}

impl SpringtimeApplicationContext {
    pub fn new(properties: ApplicationProperties) -> Self {
        Self {
            properties,
            ..Default::default()
        }
    }

    /// Adds named filters. Filters with the same name replace the existing ones.
    pub fn with_filters(mut self, filters: impl IntoIterator<Item = (String, FilterPtr)>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Sets the registry used to check for component presence.
    pub fn with_registry(mut self, registry: StaticComponentDefinitionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn properties(&self) -> &ApplicationProperties {
        &self.properties
    }
}

impl ConditionContext for SpringtimeApplicationContext {
    fn property(&self, name: &str) -> Option<String> {
        self.properties.property(name)
    }

    fn has_property(&self, name: &str) -> bool {
        self.properties.has_property(name)
    }

    fn has_bean(&self, selector: &BeanSelector) -> bool {
        match selector {
            BeanSelector::Name(name) => {
                self.filters.contains_key(name)
                    || self.registry.as_ref().map_or(false, |registry| {
                        ComponentDefinitionRegistryFacade::is_name_registered(registry, name)
                    })
            }
            BeanSelector::Type { id, .. } => self.registry.as_ref().map_or(false, |registry| {
                ComponentDefinitionRegistryFacade::is_registered(registry, *id)
            }),
        }
    }

    fn is_profile_active(&self, profile: &str) -> bool {
        self.properties.is_profile_active(profile)
    }
}

impl ApplicationContext for SpringtimeApplicationContext {
    fn filter_by_name(&self, name: &str) -> Option<FilterPtr> {
        self.filters.get(name).cloned()
    }
}
