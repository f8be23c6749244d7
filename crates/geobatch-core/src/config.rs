//! Geocoder configuration: benchmark and vintage selection, timeouts.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Maximum number of records the service accepts per submission.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Per-attempt timeout, also the delay between retries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Retries after the first submission attempt.
pub const MAX_RETRIES: u32 = 3;

/// Address-matching dataset on the upstream service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Benchmark {
    #[default]
    Current,
    Census2021,
    Census2020,
}

impl Benchmark {
    pub const ALL: [Benchmark; 3] = [Self::Current, Self::Census2021, Self::Census2020];

    /// Resolve a caller-facing label. Unknown labels fall back to `Current`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "2021" => Self::Census2021,
            "2020" => Self::Census2020,
            _ => Self::Current,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Census2021 => "2021",
            Self::Census2020 => "2020",
        }
    }

    /// Code sent in the `benchmark` form field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Current => "4",
            Self::Census2021 => "8",
            Self::Census2020 => "2020",
        }
    }
}

/// Geography vintage; selecting one switches to FIPS-augmented responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Geography {
    #[default]
    Current,
    Census2010,
    Acs2017,
    Acs2018,
    Acs2019,
    Census2020,
    Acs2021,
}

impl Geography {
    pub const ALL: [Geography; 7] = [
        Self::Current,
        Self::Census2010,
        Self::Acs2017,
        Self::Acs2018,
        Self::Acs2019,
        Self::Census2020,
        Self::Acs2021,
    ];

    /// Resolve a caller-facing label. Unknown labels fall back to `Current`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "2010" => Self::Census2010,
            "2017" => Self::Acs2017,
            "2018" => Self::Acs2018,
            "2019" => Self::Acs2019,
            "2020" => Self::Census2020,
            "2021" => Self::Acs2021,
            _ => Self::Current,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Census2010 => "2010",
            Self::Acs2017 => "2017",
            Self::Acs2018 => "2018",
            Self::Acs2019 => "2019",
            Self::Census2020 => "2020",
            Self::Acs2021 => "2021",
        }
    }

    /// Code sent in the `vintage` form field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Current => "4",
            Self::Census2010 => "410",
            Self::Acs2017 => "417",
            Self::Acs2018 => "418",
            Self::Acs2019 => "419",
            Self::Census2020 => "420",
            Self::Acs2021 => "421",
        }
    }
}

macro_rules! label_serde {
    ($ty:ty) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let label = String::deserialize(deserializer)?;
                Ok(Self::from_label(&label))
            }
        }
    };
}

label_serde!(Benchmark);
label_serde!(Geography);

/// What happens to the rest of a batch when a result listener fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerFailurePolicy {
    /// Stop dispatching and return the listener's error from `geocode`.
    /// Rows already dispatched stay dispatched.
    #[default]
    Abort,
    /// Log the failure and keep dispatching the remaining rows.
    Continue,
}

/// Configuration for [`Geocoder`](crate::engine::Geocoder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub benchmark: Benchmark,
    /// `Some` switches to the geographies endpoint and FIPS columns.
    pub geography: Option<Geography>,
    /// Per-attempt timeout and inter-retry delay.
    #[serde(with = "millis")]
    pub timeout: Duration,
    pub listener_failure: ListenerFailurePolicy,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            benchmark: Benchmark::Current,
            geography: None,
            timeout: DEFAULT_TIMEOUT,
            listener_failure: ListenerFailurePolicy::Abort,
        }
    }
}

impl GeocoderConfig {
    /// Build from caller labels, as accepted by the service documentation.
    pub fn from_labels(benchmark: Option<&str>, geography: Option<&str>) -> Self {
        Self {
            benchmark: benchmark.map(Benchmark::from_label).unwrap_or_default(),
            geography: geography.map(Geography::from_label),
            ..Default::default()
        }
    }

    pub fn benchmark(mut self, benchmark: Benchmark) -> Self {
        self.benchmark = benchmark;
        self
    }

    pub fn geography(mut self, geography: Geography) -> Self {
        self.geography = Some(geography);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn listener_failure(mut self, policy: ListenerFailurePolicy) -> Self {
        self.listener_failure = policy;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
