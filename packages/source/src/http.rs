//! `reqwest`-backed [`StatsSource`] implementation.
//!
//! Box-oriented endpoints (sales, consumption, income) answer with a bare
//! JSON array of rows. Area-oriented endpoints wrap their rows in an
//! [`AreaStatsEnvelope`] whose `resultCode` must be `"SUCCESS"`.

use async_trait::async_trait;
use district_stats_geography_models::GeoBox;
use district_stats_source_models::{
    AmountRow, ApiFamily, AreaStatsData, AreaStatsEnvelope, FloatingPopulationRow, ResidentRow,
    SalesRow, WorkerRow,
};
use serde::de::DeserializeOwned;

use crate::endpoints::EndpointConfig;
use crate::{SourceError, StatsSource, retry};

/// HTTP client for the public statistical APIs.
pub struct HttpStatsSource {
    client: reqwest::Client,
    config: EndpointConfig,
}

impl HttpStatsSource {
    /// Creates a client for the given endpoint configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(config: EndpointConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    /// Creates a client from the embedded configuration plus environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, SourceError> {
        Self::new(EndpointConfig::from_env())
    }

    async fn get_json(
        &self,
        family: ApiFamily,
        params: Vec<(&str, String)>,
    ) -> Result<serde_json::Value, SourceError> {
        let endpoint = self.config.endpoint(family)?;
        let url = self.config.url(endpoint);

        let mut query: Vec<(&str, String)> = endpoint
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        query.extend(params);

        log::debug!("{family}: GET {url} {query:?}");
        retry::send_json(family, self.client.get(&url).query(&query)).await
    }

    async fn get_box_rows<T: DeserializeOwned>(
        &self,
        family: ApiFamily,
        geo_box: &GeoBox,
        category_code: &str,
    ) -> Result<Vec<T>, SourceError> {
        let body = self
            .get_json(family, box_params(geo_box, category_code))
            .await?;
        box_rows(family, body)
    }

    async fn get_area_data(
        &self,
        family: ApiFamily,
        area_code: &str,
        category_code: &str,
    ) -> Result<AreaStatsData, SourceError> {
        let params = vec![
            ("areaCd", area_code.to_string()),
            ("upjongCd", category_code.to_string()),
        ];
        let body = self.get_json(family, params).await?;
        area_data(family, body)
    }
}

/// Query parameters describing a grid box and category.
fn box_params(geo_box: &GeoBox, category_code: &str) -> Vec<(&'static str, String)> {
    vec![
        ("minXAxis", geo_box.min_x.to_string()),
        ("maxXAxis", geo_box.max_x.to_string()),
        ("minYAxis", geo_box.min_y.to_string()),
        ("maxYAxis", geo_box.max_y.to_string()),
        ("upjongCd", category_code.to_string()),
    ]
}

/// Decodes a box-oriented response. Accepts a bare array, or an object
/// carrying the array under `data`. `null` means no rows.
fn box_rows<T: DeserializeOwned>(
    family: ApiFamily,
    body: serde_json::Value,
) -> Result<Vec<T>, SourceError> {
    let rows = match body {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Object(mut obj) => obj.remove("data").unwrap_or_default(),
        other => other,
    };
    if rows.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(rows).map_err(|source| SourceError::Shape { family, source })
}

/// Decodes an area-oriented response and checks its result code.
fn area_data(family: ApiFamily, body: serde_json::Value) -> Result<AreaStatsData, SourceError> {
    let envelope: AreaStatsEnvelope =
        serde_json::from_value(body).map_err(|source| SourceError::Shape { family, source })?;
    if !envelope.is_success() {
        return Err(SourceError::Unsuccessful {
            family,
            result_code: envelope.result_code,
            message: envelope.result_msg.unwrap_or_default(),
        });
    }
    Ok(envelope.data.unwrap_or_default())
}

#[async_trait]
impl StatsSource for HttpStatsSource {
    async fn sales(
        &self,
        geo_box: &GeoBox,
        category_code: &str,
    ) -> Result<Vec<SalesRow>, SourceError> {
        self.get_box_rows(ApiFamily::Sales, geo_box, category_code)
            .await
    }

    async fn consumption(&self, geo_box: &GeoBox) -> Result<Vec<AmountRow>, SourceError> {
        self.get_box_rows(ApiFamily::Consumption, geo_box, "").await
    }

    async fn income(&self, geo_box: &GeoBox) -> Result<Vec<AmountRow>, SourceError> {
        self.get_box_rows(ApiFamily::Income, geo_box, "").await
    }

    async fn floating_population(
        &self,
        area_code: &str,
        category_code: &str,
    ) -> Result<Vec<FloatingPopulationRow>, SourceError> {
        let data = self
            .get_area_data(ApiFamily::FloatingPopulation, area_code, category_code)
            .await?;
        Ok(data.dynppl_stats_list)
    }

    async fn residents(&self, area_code: &str) -> Result<Vec<ResidentRow>, SourceError> {
        let data = self
            .get_area_data(ApiFamily::Residents, area_code, "")
            .await?;
        Ok(data.rgn_stats_list)
    }

    async fn workers(&self, area_code: &str) -> Result<Vec<WorkerRow>, SourceError> {
        let data = self.get_area_data(ApiFamily::Workers, area_code, "").await?;
        Ok(data.wrcppl_stats_list)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn box_params_carry_edges_and_category() {
        let params = box_params(&GeoBox::new(1, 2, 3, 4), "I20101");
        assert_eq!(
            params,
            vec![
                ("minXAxis", "1".to_string()),
                ("maxXAxis", "2".to_string()),
                ("minYAxis", "3".to_string()),
                ("maxYAxis", "4".to_string()),
                ("upjongCd", "I20101".to_string()),
            ]
        );
    }

    #[test]
    fn decodes_bare_sales_array() {
        let rows: Vec<SalesRow> = box_rows(ApiFamily::Sales, json!([
            {"storeCnt": "3", "saleAmt": "1,200", "admCd": "11110515", "admNm": "Cheongun-dong"},
            {"storeCnt": 1, "saleAmt": 40, "admCd": "11110530", "admNm": "Sajik-dong"}
        ]))
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].sale_amt, "40");
    }

    #[test]
    fn decodes_wrapped_and_empty_box_responses() {
        let rows: Vec<AmountRow> = box_rows(ApiFamily::Income, json!({"data": [
            {"wholEarnAmt": "1,234", "admCd": "11010000", "admNm": "A"}
        ]}))
        .unwrap();
        assert_eq!(rows[0].amount, "1,234");

        let empty: Vec<AmountRow> = box_rows(ApiFamily::Income, json!(null)).unwrap();
        assert!(empty.is_empty());
        let empty: Vec<AmountRow> = box_rows(ApiFamily::Income, json!({"data": null})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn rejects_malformed_box_response() {
        let result: Result<Vec<SalesRow>, _> = box_rows(ApiFamily::Sales, json!("oops"));
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            SourceError::Shape {
                family: ApiFamily::Sales,
                ..
            }
        ));
        assert!(!retry::is_retryable(&err));
    }

    #[test]
    fn rejects_area_envelope_without_result_code() {
        let err = area_data(ApiFamily::Workers, json!([1, 2, 3])).unwrap_err();
        assert!(matches!(
            err,
            SourceError::Shape {
                family: ApiFamily::Workers,
                ..
            }
        ));
        assert!(err.to_string().starts_with("workers response has unexpected shape"));
        assert!(!retry::is_retryable(&err));
    }

    #[test]
    fn area_envelope_success() {
        let data = area_data(
            ApiFamily::Workers,
            json!({"resultCode": "SUCCESS", "data": {"wrcpplStatsList": [
                {"areaNm": "Cheongun-dong", "areaCd": "11110515", "wrcPopnum": "3,400"}
            ]}}),
        )
        .unwrap();
        assert_eq!(data.wrcppl_stats_list[0].wrc_popnum, "3,400");
    }

    #[test]
    fn area_envelope_failure() {
        let err = area_data(
            ApiFamily::Residents,
            json!({"resultCode": "ERROR", "resultMsg": "invalid areaCd"}),
        )
        .unwrap_err();
        match err {
            SourceError::Unsuccessful {
                family,
                result_code,
                message,
            } => {
                assert_eq!(family, ApiFamily::Residents);
                assert_eq!(result_code, "ERROR");
                assert_eq!(message, "invalid areaCd");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
