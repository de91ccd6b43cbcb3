use chronoml_core::{ChronoError, Result};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keyword configuration of a plugin.
pub type Args = serde_json::Map<String, Value>;

/// Build an [`Args`] map from `key => value` pairs.
///
/// ```
/// let args = chronoml_plugins::args! { "n_iter" => 10, "nonlin" => "relu" };
/// assert_eq!(args["n_iter"], 10);
/// ```
#[macro_export]
macro_rules! args {
    () => { $crate::Args::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Args::new();
        $( map.insert(::std::string::String::from($key), $crate::serde_json::Value::from($value)); )+
        map
    }};
}

/// Description of one tunable hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Params {
    /// Integers `low, low + step, ...` up to `high` inclusive.
    Integer {
        name: String,
        low: i64,
        high: i64,
        step: i64,
    },
    /// Floats in `[low, high]`.
    Float { name: String, low: f64, high: f64 },
    /// One of a fixed list of choices.
    Categorical { name: String, choices: Vec<Value> },
}

impl Params {
    pub fn integer(name: &str, low: i64, high: i64) -> Self {
        Self::integer_step(name, low, high, 1)
    }

    pub fn integer_step(name: &str, low: i64, high: i64, step: i64) -> Self {
        Params::Integer {
            name: name.to_string(),
            low,
            high,
            step: step.max(1),
        }
    }

    pub fn float(name: &str, low: f64, high: f64) -> Self {
        Params::Float {
            name: name.to_string(),
            low,
            high,
        }
    }

    pub fn categorical<I, V>(name: &str, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Categorical {
            name: name.to_string(),
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Params::Integer { name, .. } | Params::Float { name, .. } | Params::Categorical { name, .. } => name,
        }
    }

    /// Copy of the descriptor under another name.
    pub fn renamed(&self, new_name: String) -> Self {
        let mut out = self.clone();
        match &mut out {
            Params::Integer { name, .. } | Params::Float { name, .. } | Params::Categorical { name, .. } => {
                *name = new_name
            }
        }
        out
    }

    /// Draw one value from the domain.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            Params::Integer { low, high, step, .. } => {
                let step = (*step).max(1);
                let n = high.saturating_sub(*low).max(0) / step;
                let k = rng.gen_range(0..=n);
                Value::from(low.saturating_add(k * step))
            }
            Params::Float { low, high, .. } => {
                // empty, NaN or unbounded ranges collapse to `low`
                if low < high && (high - low).is_finite() {
                    Value::from(rng.gen_range(*low..=*high))
                } else {
                    Value::from(*low)
                }
            }
            Params::Categorical { choices, .. } => {
                if choices.is_empty() {
                    Value::Null
                } else {
                    choices[rng.gen_range(0..choices.len())].clone()
                }
            }
        }
    }

    /// Whether `value` belongs to the domain.
    pub fn contains(&self, value: &Value) -> bool {
        match self {
            Params::Integer { low, high, step, .. } => value.as_i64().is_some_and(|v| {
                let offset = i128::from(v) - i128::from(*low);
                v >= *low && v <= *high && offset % i128::from((*step).max(1)) == 0
            }),
            Params::Float { low, high, .. } => {
                value.as_f64().is_some_and(|v| v >= *low && v <= *high)
            }
            Params::Categorical { choices, .. } => choices.contains(value),
        }
    }
}

/// Draw one configuration from every descriptor of a space.
pub fn sample_space<R: Rng + ?Sized>(space: &[Params], rng: &mut R) -> Args {
    space
        .iter()
        .map(|p| (p.name().to_string(), p.sample(rng)))
        .collect()
}

/// Deserialize plugin arguments into a typed parameter struct.
///
/// Unknown keys and ill-typed values surface as `InvalidParameters`.
pub fn parse_args<T: DeserializeOwned>(plugin: &str, args: &Args) -> Result<T> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| ChronoError::invalid_parameters(plugin, e.to_string()))
}

/// Serialize a parameter struct back into an [`Args`] map.
pub fn to_args<T: Serialize>(params: &T) -> Args {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => map,
        _ => Args::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    #[serde(deny_unknown_fields, default)]
    struct Demo {
        n_iter: usize,
        lr: f64,
    }

    impl Default for Demo {
        fn default() -> Self {
            Demo { n_iter: 100, lr: 1e-3 }
        }
    }

    #[test]
    fn test_parse_args_defaults_and_unknown() {
        let parsed: Demo = parse_args("demo", &crate::args! { "n_iter" => 10 }).unwrap();
        assert_eq!(parsed, Demo { n_iter: 10, lr: 1e-3 });
        let err = parse_args::<Demo>("demo", &crate::args! { "depth" => 3 }).unwrap_err();
        assert!(matches!(err, ChronoError::InvalidParameters { .. }));
        assert_eq!(to_args(&parsed)["n_iter"], 10);
    }

    #[test]
    fn test_contains() {
        let p = Params::integer_step("units", 10, 100, 10);
        assert!(p.contains(&Value::from(40)));
        assert!(!p.contains(&Value::from(45)));
        assert!(!p.contains(&Value::from(110)));
        let c = Params::categorical("nonlin", ["relu", "tanh"]);
        assert!(c.contains(&Value::from("relu")));
        assert!(!c.contains(&Value::from("elu")));
    }

    #[test]
    fn test_degenerate_domains_do_not_panic() {
        let mut rng = StdRng::seed_from_u64(0);
        let zero_step: Params =
            serde_json::from_str(r#"{"kind":"integer","name":"x","low":0,"high":4,"step":0}"#).unwrap();
        for _ in 0..20 {
            assert!(zero_step.contains(&zero_step.sample(&mut rng)));
        }
        assert!(zero_step.contains(&Value::from(3)));

        let wide = Params::integer("w", i64::MIN, i64::MAX);
        assert!(wide.contains(&wide.sample(&mut rng)));

        let nan = Params::float("lr", f64::NAN, 1.0);
        assert!(nan.sample(&mut rng).is_null());
        assert!(!nan.contains(&Value::from(0.5)));
        let unbounded = Params::float("lr", 0.0, f64::INFINITY);
        assert_eq!(unbounded.sample(&mut rng), Value::from(0.0));
        let reversed = Params::float("lr", 1.0, 0.0);
        assert_eq!(reversed.sample(&mut rng), Value::from(1.0));
    }

    #[test]
    fn test_renamed() {
        let p = Params::float("lr", 0.0, 1.0).renamed("model.lr".into());
        assert_eq!(p.name(), "model.lr");
    }

    proptest! {
        #[test]
        fn prop_samples_stay_in_domain(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let space = vec![
                Params::integer("n_layers", 1, 4),
                Params::integer_step("units", 10, 100, 5),
                Params::float("dropout", 0.0, 0.2),
                Params::categorical("lr", [1e-3, 1e-4, 2e-4]),
            ];
            let args = sample_space(&space, &mut rng);
            for p in &space {
                prop_assert!(p.contains(&args[p.name()]));
            }
        }
    }
}
