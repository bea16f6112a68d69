use crate::config::Record;

type InitFn = Box<dyn Fn() -> f64>;
type StepFn = Box<dyn Fn(f64, &Record) -> f64>;

/// The aggregation applied by a group.
///
/// A reducer is a triple of functions: `init` gives the value of an empty
/// bucket, `add` folds a record entering the bucket and `remove` takes one
/// out. `remove` must undo `add` for the group values to stay exact when
/// filters are cleared.
pub struct Reducer {
    name: String,
    init: InitFn,
    add: StepFn,
    remove: StepFn,
}

impl Reducer {
    pub fn new<A, R, I>(add: A, remove: R, init: I) -> Reducer
    where
        A: Fn(f64, &Record) -> f64 + 'static,
        R: Fn(f64, &Record) -> f64 + 'static,
        I: Fn() -> f64 + 'static,
    {
        Reducer {
            name: "custom".to_string(),
            init: Box::new(init),
            add: Box::new(add),
            remove: Box::new(remove),
        }
    }

    /// Number of records in each bucket.
    pub fn count() -> Reducer {
        Reducer {
            name: "count".to_string(),
            ..Reducer::new(|v, _| v + 1.0, |v, _| v - 1.0, || 0.0)
        }
    }

    /// Sum of a numeric field in each bucket.
    pub fn sum(field: &str) -> Reducer {
        let f_add = field.to_string();
        let f_remove = field.to_string();
        Reducer {
            name: format!("sum({})", field),
            ..Reducer::new(
                move |v, r| v + r.numeric(&f_add),
                move |v, r| v - r.numeric(&f_remove),
                || 0.0,
            )
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn init(&self) -> f64 {
        (self.init)()
    }

    pub(crate) fn add(&self, value: f64, record: &Record) -> f64 {
        (self.add)(value, record)
    }

    pub(crate) fn remove(&self, value: f64, record: &Record) -> f64 {
        (self.remove)(value, record)
    }
}

impl std::fmt::Debug for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reducer({})", self.name)
    }
}
