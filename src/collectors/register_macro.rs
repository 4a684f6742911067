macro_rules! register_collectors {
    (
        $(
            $module:ident => $collector_type:ident
        ),* $(,)?
    ) => {
        // Import all collector modules
        $(
            pub mod $module;
            pub use $module::$collector_type;
        )*

        /// Factory map keyed by the collector (and CLI flag) name.
        pub fn all_factories() -> HashMap<&'static str, fn() -> SharedCollector> {
            let mut map: HashMap<&'static str, fn() -> SharedCollector> = HashMap::new();
            $(
                map.insert(
                    stringify!($module),
                    || Arc::new($collector_type::new()) as SharedCollector,
                );
            )*
            map
        }

        /// Collector names in registration order; this order is the execution order.
        pub const COLLECTOR_NAMES: &[&'static str] = &[
            $(stringify!($module),)*
        ];
    };
}
