//! Region directory
//!
//! Maps region codes (`us-east-1`) to the display names the on-demand pricing
//! feed keys its data by (`US East (N. Virginia)`).

/// A region known to both the interruption dataset and the pricing feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    pub code: &'static str,
    pub pricing_name: &'static str,
}

const REGIONS: &[RegionInfo] = &[
    RegionInfo { code: "us-east-1", pricing_name: "US East (N. Virginia)" },
    RegionInfo { code: "us-east-2", pricing_name: "US East (Ohio)" },
    RegionInfo { code: "us-west-1", pricing_name: "US West (N. California)" },
    RegionInfo { code: "us-west-2", pricing_name: "US West (Oregon)" },
    RegionInfo { code: "af-south-1", pricing_name: "Africa (Cape Town)" },
    RegionInfo { code: "ap-east-1", pricing_name: "Asia Pacific (Hong Kong)" },
    RegionInfo { code: "ap-south-1", pricing_name: "Asia Pacific (Mumbai)" },
    RegionInfo { code: "ap-south-2", pricing_name: "Asia Pacific (Hyderabad)" },
    RegionInfo { code: "ap-southeast-1", pricing_name: "Asia Pacific (Singapore)" },
    RegionInfo { code: "ap-southeast-2", pricing_name: "Asia Pacific (Sydney)" },
    RegionInfo { code: "ap-southeast-3", pricing_name: "Asia Pacific (Jakarta)" },
    RegionInfo { code: "ap-southeast-4", pricing_name: "Asia Pacific (Melbourne)" },
    RegionInfo { code: "ap-southeast-6", pricing_name: "Asia Pacific (Philippines)" },
    RegionInfo { code: "ap-southeast-7", pricing_name: "Asia Pacific (Thailand)" },
    RegionInfo { code: "ap-northeast-1", pricing_name: "Asia Pacific (Tokyo)" },
    RegionInfo { code: "ap-northeast-2", pricing_name: "Asia Pacific (Seoul)" },
    RegionInfo { code: "ap-northeast-3", pricing_name: "Asia Pacific (Osaka)" },
    RegionInfo { code: "ca-central-1", pricing_name: "Canada (Central)" },
    RegionInfo { code: "ca-west-1", pricing_name: "Canada West (Calgary)" },
    RegionInfo { code: "eu-central-1", pricing_name: "EU (Frankfurt)" },
    RegionInfo { code: "eu-central-2", pricing_name: "EU (Zurich)" },
    RegionInfo { code: "eu-west-1", pricing_name: "EU (Ireland)" },
    RegionInfo { code: "eu-west-2", pricing_name: "EU (London)" },
    RegionInfo { code: "eu-west-3", pricing_name: "EU (Paris)" },
    RegionInfo { code: "eu-south-1", pricing_name: "EU (Milan)" },
    RegionInfo { code: "eu-south-2", pricing_name: "EU (Spain)" },
    RegionInfo { code: "eu-north-1", pricing_name: "EU (Stockholm)" },
    RegionInfo { code: "il-central-1", pricing_name: "Israel (Tel Aviv)" },
    RegionInfo { code: "me-central-1", pricing_name: "Middle East (UAE)" },
    RegionInfo { code: "me-south-1", pricing_name: "Middle East (Bahrain)" },
    RegionInfo { code: "sa-east-1", pricing_name: "South America (Sao Paulo)" },
    RegionInfo { code: "mx-central-1", pricing_name: "Mexico (Central)" },
];

pub fn all() -> &'static [RegionInfo] {
    REGIONS
}

pub fn find(code: &str) -> Option<&'static RegionInfo> {
    REGIONS.iter().find(|r| r.code == code)
}

/// Pricing-feed display name for a region code
pub fn display_name(code: &str) -> Option<&'static str> {
    find(code).map(|r| r.pricing_name)
}

/// Reverse lookup from a pricing-feed display name
pub fn code_for_name(name: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|r| r.pricing_name == name)
        .map(|r| r.code)
}

pub fn is_known(code: &str) -> bool {
    find(code).is_some()
}
