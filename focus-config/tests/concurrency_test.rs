//! Concurrent first access and precedence properties

use focus_config::*;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

/// Source that counts lookups
#[derive(Debug)]
struct CountingSource {
    inner: MapSource,
    lookups: AtomicUsize,
}

impl Source for CountingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn lookup(&self, key: &str) -> Option<RawValue> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        // widen the race window
        thread::yield_now();
        self.inner.lookup(key)
    }
}

#[test]
fn test_concurrent_first_access_looks_up_once() {
    const THREADS: usize = 16;

    let counting = Arc::new(CountingSource {
        inner: MapSource::new("current").with("jicofo.xmpp.client.port", 5347),
        lookups: AtomicUsize::new(0),
    });
    let source: SourceRef = counting.clone();

    let group = PropertyGroup::new("client", "jicofo.xmpp.client");
    let port = group
        .register(RequiredDescriptor::<u16>::required("port").from(&source, group.key("port")))
        .unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let port = port.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                port.resolve()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ok(5347));
    }
    assert_eq!(counting.lookups.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_computed_defaults() {
    const THREADS: usize = 8;

    let current = MapSource::new("current").with("xmpp-domain", "example.com").shared();
    let group = PropertyGroup::new("client", "");
    let domain = group
        .register(RequiredDescriptor::<DomainJid>::required("xmpp-domain").from(&current, "xmpp-domain"))
        .unwrap();
    let muc = group
        .register(RequiredDescriptor::<DomainJid>::required("conference-muc-jid").default_with(
            |siblings| {
                let domain: DomainJid = siblings.require("xmpp-domain")?;
                Ok(domain.subdomain("conference")?)
            },
        ))
        .unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let (domain, muc) = (domain.clone(), muc.clone());
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // half the threads start from the dependency, half from the dependent
                if i % 2 == 0 {
                    domain.resolve().unwrap();
                }
                muc.resolve().unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().as_str(), "conference.example.com");
    }
}

proptest! {
    #[test]
    fn test_first_present_lookup_wins(
        present in proptest::collection::vec(any::<bool>(), 1..6),
        default in any::<bool>(),
    ) {
        let sources: Vec<SourceRef> = present
            .iter()
            .enumerate()
            .map(|(i, holds)| {
                let source = MapSource::new(format!("s{}", i));
                let source = if *holds { source.with("key", i as u64) } else { source };
                source.shared()
            })
            .collect();

        let mut descriptor = RequiredDescriptor::<u64>::required("key");
        for source in &sources {
            descriptor = descriptor.from(source, "key");
        }
        if default {
            descriptor = descriptor.default_value(99);
        }

        let group = PropertyGroup::new("prop", "");
        let property = group.register(descriptor).unwrap();

        match present.iter().position(|holds| *holds) {
            Some(first) => prop_assert_eq!(property.resolve(), Ok(first as u64)),
            None if default => prop_assert_eq!(property.resolve(), Ok(99)),
            None => {
                let err = property.resolve().unwrap_err();
                prop_assert!(err.is_missing());
            }
        }
    }
}
