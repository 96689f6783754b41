//! KRX market and KOSPI sector index codes tracked by the collectors.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCode {
    pub code: &'static str,
    pub name: &'static str,
}

pub static MARKET_INDICES: [IndexCode; 3] = [
    IndexCode { code: "0001", name: "KOSPI" },
    IndexCode { code: "1001", name: "KOSDAQ" },
    IndexCode { code: "2001", name: "KOSPI200" },
];

pub static SECTOR_INDICES: [IndexCode; 17] = [
    IndexCode { code: "1010", name: "에너지" },
    IndexCode { code: "1011", name: "화학" },
    IndexCode { code: "1012", name: "비금속" },
    IndexCode { code: "1013", name: "철강" },
    IndexCode { code: "1014", name: "기계" },
    IndexCode { code: "1015", name: "전기전자" },
    IndexCode { code: "1016", name: "의료정밀" },
    IndexCode { code: "1017", name: "운수장비" },
    IndexCode { code: "1018", name: "유통" },
    IndexCode { code: "1019", name: "건설" },
    IndexCode { code: "1020", name: "운수창고" },
    IndexCode { code: "1021", name: "통신업" },
    IndexCode { code: "1022", name: "금융" },
    IndexCode { code: "1023", name: "증권" },
    IndexCode { code: "1024", name: "보험" },
    IndexCode { code: "1025", name: "서비스" },
    IndexCode { code: "1026", name: "제조" },
];

pub fn all_indices() -> impl Iterator<Item = &'static IndexCode> {
    MARKET_INDICES.iter().chain(SECTOR_INDICES.iter())
}

pub fn index_name(code: &str) -> Option<&'static str> {
    all_indices().find(|i| i.code == code).map(|i| i.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        assert_eq!(all_indices().count(), 20);
        assert_eq!(index_name("1001"), Some("KOSDAQ"));
        assert_eq!(index_name("1026"), Some("제조"));
        assert_eq!(index_name("9999"), None);
    }
}
