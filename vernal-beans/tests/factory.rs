mod factory_test {
    use std::sync::{Arc, Mutex};
    use vernal_beans::definition::{BeanDefinition, Ordering, ProcessorTier};
    use vernal_beans::error::ErrorPtr;
    use vernal_beans::factory::BeanFactoryBuilder;
    use vernal_beans::instance_provider::TypedBeanInstanceProvider;
    use vernal_beans::processor::{
        invoke_factory_processors, register_instance_processors, RegistryPostProcessor,
        RegistryProcessorPtr,
    };
    use vernal_beans::registry::internal::{submit, DefinitionRegisterer};
    use vernal_beans::registry::DefinitionRegistry;

    struct Counter(u32);

    fn counter() -> BeanDefinition {
        BeanDefinition::object("counter", |_| Ok(Counter(7)))
    }

    submit! {
        DefinitionRegisterer { register: counter }
    }

    struct TierRecorder {
        tier: ProcessorTier,
        log: Arc<Mutex<Vec<ProcessorTier>>>,
        spawn: Option<Ordering>,
    }

    impl RegistryPostProcessor for TierRecorder {
        fn process_registry(&self, registry: &mut dyn DefinitionRegistry) -> Result<(), ErrorPtr> {
            self.log.lock().unwrap().push(self.tier);

            if let Some(ordering) = self.spawn {
                let name = format!("spawned_by_{}", registry.len());
                registry
                    .register_definition(recorder(&name, ordering, self.log.clone(), None))
                    .map_err(|error| Arc::new(error) as ErrorPtr)?;
            }

            Ok(())
        }
    }

    fn recorder(
        name: &str,
        ordering: Ordering,
        log: Arc<Mutex<Vec<ProcessorTier>>>,
        spawn: Option<Ordering>,
    ) -> BeanDefinition {
        BeanDefinition::registry_processor(name, ordering, move |_| {
            Ok(Arc::new(TierRecorder {
                tier: ordering.tier(),
                log: log.clone(),
                spawn,
            }) as RegistryProcessorPtr)
        })
    }

    #[test]
    fn should_create_static_beans() {
        let mut factory = BeanFactoryBuilder::new().unwrap().build();
        assert_eq!(factory.instance_typed::<Counter>("counter").unwrap().0, 7);
    }

    #[test]
    fn should_never_run_primary_after_secondary() {
        let log = Arc::new(Mutex::new(vec![]));
        let mut factory = BeanFactoryBuilder::new().unwrap().build();

        let registry = factory.registry_mut();
        registry
            .register_definition(recorder(
                "secondary",
                Ordering::Ordered(0),
                log.clone(),
                Some(Ordering::Ordered(1)),
            ))
            .unwrap();
        registry
            .register_definition(recorder(
                "primary",
                Ordering::Priority(0),
                log.clone(),
                Some(Ordering::Priority(1)),
            ))
            .unwrap();
        registry
            .register_definition(recorder(
                "unordered",
                Ordering::Unordered,
                log.clone(),
                Some(Ordering::Unordered),
            ))
            .unwrap();

        invoke_factory_processors(&mut factory, &[]).unwrap();
        register_instance_processors(&mut factory).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 6);
        assert!(log.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
