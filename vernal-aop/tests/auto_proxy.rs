mod auto_proxy_test {
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use vernal_aop::advisor::Advisor;
    use vernal_aop::auto_proxy::AutoProxyProcessor;
    use vernal_aop::policy::TargetType;
    use vernal_aop::proxy::{
        Interface, InterceptorPtr, MethodInterceptor, MethodInvocation, Target, TargetPtr,
    };
    use vernal_beans::definition::BeanDefinition;
    use vernal_beans::error::ErrorPtr;
    use vernal_beans::factory::BeanFactoryBuilder;
    use vernal_beans::instance_provider::TypedBeanInstanceProvider;
    use vernal_beans::processor::{invoke_factory_processors, register_instance_processors};
    use vernal_beans::registry::{DefinitionRegistry, OrderedDefinitionRegistry};

    struct Accounts;

    impl Target for Accounts {
        fn target_type(&self) -> TargetType {
            TargetType::concrete("bank::Accounts")
        }

        fn interfaces(&self) -> Vec<Interface> {
            vec![Interface::new("bank::AccountQueries", ["balance"])]
        }

        fn operations(&self) -> Vec<String> {
            vec!["balance".to_string(), "close".to_string()]
        }

        fn invoke(&self, operation: &str, _arguments: &Value) -> Result<Value, ErrorPtr> {
            match operation {
                "balance" => Ok(json!(100)),
                _ => Ok(Value::Null),
            }
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl MethodInterceptor for Counting {
        fn invoke(&self, invocation: &mut MethodInvocation) -> Result<Value, ErrorPtr> {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
            invocation.proceed()
        }
    }

    #[test]
    fn should_proxy_beans_created_by_factory() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut factory = BeanFactoryBuilder::new()
            .unwrap()
            .with_definition_registry(Box::new(OrderedDefinitionRegistry::new(false)))
            .build();

        factory
            .registry_mut()
            .register_definition(
                AutoProxyProcessor::new(vec![Advisor::with_pattern(
                    "bal*",
                    Arc::new(Counting(calls.clone())) as InterceptorPtr,
                )
                .unwrap()])
                .definition(),
            )
            .unwrap();
        factory
            .registry_mut()
            .register_definition(BeanDefinition::object("accounts", |_| {
                Ok(Arc::new(Accounts) as TargetPtr)
            }))
            .unwrap();

        invoke_factory_processors(&mut factory, &[]).unwrap();
        register_instance_processors(&mut factory).unwrap();

        let accounts = factory.instance_typed::<TargetPtr>("accounts").unwrap();
        assert!(accounts.target_type().is_proxy);
        assert_eq!(accounts.invoke("balance", &Value::Null).unwrap(), json!(100));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);

        // interface proxy hides operations the interface does not declare
        assert!(accounts.invoke("close", &Value::Null).is_err());
    }
}
