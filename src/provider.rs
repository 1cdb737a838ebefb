//! Provider extraction (spec.md §4.4, component C2).
//!
//! Derives a lowercase provider tag and well-known SKU hints from a
//! resource type token, tolerating malformed input.

pub const UNKNOWN: &str = "unknown";

/// Extract the lowercase provider segment — the substring before the first
/// `:` — or `UNKNOWN` when no colon is present or the prefix is empty.
pub fn extract_provider(type_token: &str) -> String {
    match type_token.split_once(':') {
        Some((prefix, _)) if !prefix.is_empty() => prefix.to_lowercase(),
        _ => UNKNOWN.to_string(),
    }
}

/// Split a type token's middle colon segment (`module/resource`) at most
/// three ways, as the AWS SKU lookup requires: `module`, `resource`, and
/// anything left over is discarded (type tokens never carry more than the
/// module/resource pair in that segment).
fn module_resource(type_token: &str) -> Option<(&str, &str)> {
    let mut parts = type_token.splitn(3, ':');
    let _provider = parts.next()?;
    let module_segment = parts.next()?;
    module_segment.split_once('/')
}

/// Well-known AWS SKU lookup: maps `(module, resource)` pairs to a canonical
/// SKU name. Unrecognized combinations return `None`.
fn aws_sku(module: &str, resource: &str) -> Option<&'static str> {
    match (module, resource) {
        ("ec2", "instance") => Some("AmazonEC2"),
        ("ec2", "volume") => Some("AmazonEBS"),
        ("rds", "instance") => Some("AmazonRDS"),
        ("rds", "cluster") => Some("AmazonRDS"),
        ("s3", "bucket") => Some("AmazonS3"),
        ("lambda", "function") => Some("AWSLambda"),
        ("elasticache", "cluster") => Some("AmazonElastiCache"),
        ("eks", "cluster") => Some("AmazonEKS"),
        ("dynamodb", "table") => Some("AmazonDynamoDB"),
        ("elb", "loadbalancer") | ("elasticloadbalancingv2", "loadbalancer") => {
            Some("AWSELB")
        }
        _ => None,
    }
}

/// Canonical SKU hint for a type token, when the provider is AWS and the
/// module/resource pair is recognized.
pub fn sku_hint(type_token: &str) -> Option<&'static str> {
    if extract_provider(type_token) != "aws" {
        return None;
    }
    let (module, resource) = module_resource(type_token)?;
    aws_sku(module, &resource.to_lowercase())
}
