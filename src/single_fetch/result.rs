use std::rc::Rc;

use http::StatusCode;
use indexmap::IndexMap;

use crate::{
    error::{Error, Result},
    router::{Redirect, RouteOutcome, X_REMIX_RELOAD_DOCUMENT, X_REMIX_REVALIDATE},
    turbo::TurboValue,
};

/// The outcome of one route in a single fetch response.
///
/// Well formed results carry exactly one of the three tags, but every tag
/// that is present is kept so that [`unwrap_single_fetch_result`] can
/// apply its precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleFetchResult {
    pub data: Option<TurboValue>,
    pub error: Option<TurboValue>,
    pub redirect: Option<SingleFetchRedirect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleFetchRedirect {
    pub redirect: String,
    pub status: u16,
    pub revalidate: bool,
    pub reload: bool,
}

impl SingleFetchResult {
    pub fn data(value: impl Into<TurboValue>) -> Self {
        Self {
            data: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn error(value: impl Into<TurboValue>) -> Self {
        Self {
            error: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn redirect(redirect: SingleFetchRedirect) -> Self {
        Self {
            redirect: Some(redirect),
            ..Default::default()
        }
    }

    /// Read a result from its decoded form.  Tags are detected by key
    /// presence, so `{data: undefined}` still counts as data.
    pub fn from_turbo(value: TurboValue) -> Result<Self> {
        let TurboValue::Object(map) = value else {
            return Err(Error::MalformedResult(format!(
                "expected a result object, got {value}"
            )));
        };
        let mut map = Rc::unwrap_or_clone(map);
        let redirect = match map.shift_remove("redirect") {
            Some(location) => {
                let redirect = location.as_str().map(str::to_string).ok_or_else(|| {
                    Error::MalformedResult(format!("redirect target is not a string: {location}"))
                })?;
                let status = match map.get("status") {
                    None => 302,
                    Some(status) => status
                        .as_f64()
                        .filter(|n| n.fract() == 0.0 && (0.0..=u16::MAX as f64).contains(n))
                        .map(|n| n as u16)
                        .ok_or_else(|| {
                            Error::MalformedResult(format!("invalid redirect status {status}"))
                        })?,
                };
                Some(SingleFetchRedirect {
                    redirect,
                    status,
                    revalidate: map.get("revalidate").is_some_and(TurboValue::is_truthy),
                    reload: map.get("reload").is_some_and(TurboValue::is_truthy),
                })
            }
            None => None,
        };
        Ok(Self {
            data: map.shift_remove("data"),
            error: map.shift_remove("error"),
            redirect,
        })
    }

    pub fn into_turbo(self) -> TurboValue {
        let mut map = IndexMap::new();
        if let Some(data) = self.data {
            map.insert("data".to_string(), data);
        }
        if let Some(error) = self.error {
            map.insert("error".to_string(), error);
        }
        if let Some(redirect) = self.redirect {
            map.insert("redirect".to_string(), redirect.redirect.into());
            map.insert("status".to_string(), f64::from(redirect.status).into());
            map.insert("revalidate".to_string(), redirect.revalidate.into());
            map.insert("reload".to_string(), redirect.reload.into());
        }
        TurboValue::Object(Rc::new(map))
    }
}

/// The decoded body of one batched loader exchange, keyed by route id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleFetchResults(pub IndexMap<String, SingleFetchResult>);

impl SingleFetchResults {
    pub fn get(&self, route_id: &str) -> Option<&SingleFetchResult> {
        self.0.get(route_id)
    }

    pub fn from_turbo(value: TurboValue) -> Result<Self> {
        let TurboValue::Object(map) = value else {
            return Err(Error::MalformedResult(format!(
                "expected a mapping of route ids to results, got {value}"
            )));
        };
        Rc::unwrap_or_clone(map)
            .into_iter()
            .map(|(route_id, result)| Ok((route_id, SingleFetchResult::from_turbo(result)?)))
            .collect::<Result<_>>()
            .map(Self)
    }

    pub fn into_turbo(self) -> TurboValue {
        TurboValue::object(
            self.0
                .into_iter()
                .map(|(route_id, result)| (route_id, result.into_turbo())),
        )
    }
}

impl<K: Into<String>> FromIterator<(K, SingleFetchResult)> for SingleFetchResults {
    fn from_iter<I: IntoIterator<Item = (K, SingleFetchResult)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Turn one route's result into what its loader or action produced.
///
/// `error` takes precedence over `redirect`, which takes precedence over
/// `data`.  A result with none of them is an error naming the route.
pub fn unwrap_single_fetch_result(
    result: &SingleFetchResult,
    route_id: &str,
) -> Result<RouteOutcome> {
    if let Some(error) = &result.error {
        return Err(Error::Thrown(error.clone()));
    }
    if let Some(target) = &result.redirect {
        let status = StatusCode::from_u16(target.status).map_err(|_| {
            Error::MalformedResult(format!("invalid redirect status {}", target.status))
        })?;
        let mut redirect = Redirect::new(target.redirect.clone(), status);
        if target.revalidate {
            redirect = redirect.with_flag(X_REMIX_REVALIDATE);
        }
        if target.reload {
            redirect = redirect.with_flag(X_REMIX_RELOAD_DOCUMENT);
        }
        return Ok(RouteOutcome::Redirect(redirect));
    }
    if let Some(data) = &result.data {
        return Ok(RouteOutcome::Data(data.clone()));
    }
    Err(Error::NoResult {
        route_id: route_id.to_string(),
    })
}
