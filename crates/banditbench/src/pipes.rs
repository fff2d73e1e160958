//! Streaming pipe primitives: sources, filters, sinks and their composition.
//!
//! A [`Source`] produces a lazy sequence, a [`Filter`] transforms one lazy
//! sequence into another, and a [`Sink`] consumes one. Composition preserves
//! both the category and the laziness:
//!
//! - source ∘ filter  = source  ([`SourceFilters`])
//! - filter ∘ filter  = filter  ([`FiltersFilter`])
//! - filter ∘ sink    = sink    ([`FiltersSink`])
//!
//! No stage materializes the full stream unless its semantics require it
//! (reservoir sampling and one-hot fitting are the two stages that do).
//!
//! Fallible streams are modeled by choosing `T = Result<Row, BenchError>`;
//! a filter passes errors through and the terminal consumer decides the
//! failure scope.

use crate::error::BenchResult;

/// A boxed lazy sequence. `Send` so streams can be handed to worker threads.
pub type BoxIter<T> = Box<dyn Iterator<Item = T> + Send>;

/// A producer of a finite or indefinite lazy sequence of `T`.
///
/// Sources are re-readable: `read` may be called multiple times and, for a
/// fixed seed, must yield equivalent sequences.
pub trait Source<T>: Send + Sync {
    /// Begin a fresh pass over the sequence.
    fn read(&self) -> BenchResult<BoxIter<T>>;
}

/// A transformer from a lazy sequence of `I` to a lazy sequence of `O`.
pub trait Filter<I, O>: Send + Sync {
    /// Wrap `items` in this stage's transformation.
    fn filter(&self, items: BoxIter<I>) -> BoxIter<O>;
}

/// A consumer of a lazy sequence of `T`.
pub trait Sink<T>: Send + Sync {
    /// Drain `items` into the sink.
    fn write(&self, items: BoxIter<T>) -> BenchResult<()>;
}

// ── Composition ──────────────────────────────────────────────────────────────

/// A source followed by a filter, itself a source.
pub struct SourceFilters<I, O> {
    source: Box<dyn Source<I>>,
    filter: Box<dyn Filter<I, O>>,
}

impl<I, O> SourceFilters<I, O> {
    pub fn new(source: Box<dyn Source<I>>, filter: Box<dyn Filter<I, O>>) -> Self {
        SourceFilters { source, filter }
    }
}

impl<I: 'static, O: 'static> Source<O> for SourceFilters<I, O> {
    fn read(&self) -> BenchResult<BoxIter<O>> {
        Ok(self.filter.filter(self.source.read()?))
    }
}

/// Two filters run back to back, itself a filter.
pub struct FiltersFilter<I, M, O> {
    first: Box<dyn Filter<I, M>>,
    second: Box<dyn Filter<M, O>>,
}

impl<I, M, O> FiltersFilter<I, M, O> {
    pub fn new(first: Box<dyn Filter<I, M>>, second: Box<dyn Filter<M, O>>) -> Self {
        FiltersFilter { first, second }
    }
}

impl<I: 'static, M: 'static, O: 'static> Filter<I, O> for FiltersFilter<I, M, O> {
    fn filter(&self, items: BoxIter<I>) -> BoxIter<O> {
        self.second.filter(self.first.filter(items))
    }
}

/// A filter in front of a sink, itself a sink.
pub struct FiltersSink<I, O> {
    filter: Box<dyn Filter<I, O>>,
    sink: Box<dyn Sink<O>>,
}

impl<I, O> FiltersSink<I, O> {
    pub fn new(filter: Box<dyn Filter<I, O>>, sink: Box<dyn Sink<O>>) -> Self {
        FiltersSink { filter, sink }
    }
}

impl<I: 'static, O: 'static> Sink<I> for FiltersSink<I, O> {
    fn write(&self, items: BoxIter<I>) -> BenchResult<()> {
        self.sink.write(self.filter.filter(items))
    }
}

// ── Basic implementations ────────────────────────────────────────────────────

/// A source backed by an owned list; every read clones the items.
pub struct ListSource<T> {
    items: Vec<T>,
}

impl<T> ListSource<T> {
    pub fn new(items: Vec<T>) -> Self {
        ListSource { items }
    }
}

impl<T: Clone + Send + Sync + 'static> Source<T> for ListSource<T> {
    fn read(&self) -> BenchResult<BoxIter<T>> {
        Ok(Box::new(self.items.clone().into_iter()))
    }
}

/// A filter that passes every item through unchanged.
pub struct IdentityFilter;

impl<T: 'static> Filter<T, T> for IdentityFilter {
    fn filter(&self, items: BoxIter<T>) -> BoxIter<T> {
        items
    }
}

/// A sink that collects items behind a mutex, for tests and log capture.
#[derive(Default)]
pub struct MemorySink<T> {
    items: std::sync::Mutex<Vec<T>>,
}

impl<T: Clone> MemorySink<T> {
    pub fn new() -> Self {
        MemorySink { items: std::sync::Mutex::new(Vec::new()) }
    }

    /// A snapshot of everything written so far.
    pub fn items(&self) -> Vec<T> {
        self.items.lock().expect("MemorySink mutex poisoned").clone()
    }
}

impl<T: Clone + Send + Sync> Sink<T> for MemorySink<T> {
    fn write(&self, items: BoxIter<T>) -> BenchResult<()> {
        let mut guard = self.items.lock().expect("MemorySink mutex poisoned");
        guard.extend(items);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DoubleFilter;

    impl Filter<i64, i64> for DoubleFilter {
        fn filter(&self, items: BoxIter<i64>) -> BoxIter<i64> {
            Box::new(items.map(|x| x * 2))
        }
    }

    struct EvenFilter;

    impl Filter<i64, i64> for EvenFilter {
        fn filter(&self, items: BoxIter<i64>) -> BoxIter<i64> {
            Box::new(items.filter(|x| x % 2 == 0))
        }
    }

    #[test]
    fn test_list_source_is_rereadable() {
        let source = ListSource::new(vec![1i64, 2, 3]);
        let first: Vec<i64> = source.read().expect("read").collect();
        let second: Vec<i64> = source.read().expect("read").collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![1, 2, 3]);
    }

    #[test]
    fn test_source_filters_is_a_source() {
        let piped = SourceFilters::new(
            Box::new(ListSource::new(vec![1i64, 2, 3])),
            Box::new(DoubleFilter),
        );
        let out: Vec<i64> = piped.read().expect("read").collect();
        assert_eq!(out, vec![2, 4, 6]);
    }

    #[test]
    fn test_filters_filter_composes_in_order() {
        let chain = FiltersFilter::new(Box::new(DoubleFilter), Box::new(EvenFilter));
        let out: Vec<i64> =
            chain.filter(Box::new(vec![1i64, 2, 3].into_iter())).collect();
        // doubling first makes everything even
        assert_eq!(out, vec![2, 4, 6]);
    }

    #[test]
    fn test_filters_sink_is_a_sink() {
        let sink: std::sync::Arc<MemorySink<i64>> = std::sync::Arc::new(MemorySink::new());

        struct SharedSink(std::sync::Arc<MemorySink<i64>>);
        impl Sink<i64> for SharedSink {
            fn write(&self, items: BoxIter<i64>) -> BenchResult<()> {
                self.0.write(items)
            }
        }

        let piped = FiltersSink::new(
            Box::new(DoubleFilter),
            Box::new(SharedSink(std::sync::Arc::clone(&sink))),
        );
        piped.write(Box::new(vec![1i64, 2].into_iter())).expect("write");
        assert_eq!(sink.items(), vec![2, 4]);
    }

    #[test]
    fn test_composition_stays_lazy() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let pulled = Arc::new(AtomicUsize::new(0));
        let pulled_inner = Arc::clone(&pulled);

        struct CountingSource(Arc<AtomicUsize>);
        impl Source<i64> for CountingSource {
            fn read(&self) -> BenchResult<BoxIter<i64>> {
                let counter = Arc::clone(&self.0);
                Ok(Box::new((0i64..100).inspect(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })))
            }
        }

        let piped = SourceFilters::new(
            Box::new(CountingSource(pulled_inner)),
            Box::new(DoubleFilter),
        );
        let mut stream = piped.read().expect("read");
        assert_eq!(stream.next(), Some(0));
        assert_eq!(stream.next(), Some(2));
        drop(stream);
        assert_eq!(
            pulled.load(Ordering::SeqCst),
            2,
            "only the pulled elements should have been produced"
        );
    }
}
