// crates/ln_core/src/datapoint.rs

//! 训练数据点
//!
//! 一个 [`DataPoint`] 描述一段训练序列：起始步 `index`、序列长度，以及
//! 压缩空间窗口与由它推出的两个原始状态窗口。构造后不再修改。
//!
//! 索引文件中每个数据点占一行，逗号分隔并以逗号结尾：
//!
//! ```text
//! index,sequence_length,full.pos..,full.size..,seq.pos..,seq.size..,
//! ```
//!
//! 压缩窗口不落盘，加载时由 `state_converter.contract(full)` 重新推出。

use std::fmt::Write as _;
use std::ops::Range;

use ln_foundation::{ensure, LnError, LnResult, SubDomain};

use crate::network::NetworkGeometry;
use crate::shape::ShapeConverter;

/// 训练数据点
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataPoint {
    index: u64,
    sequence_length: usize,
    compressed_subdomain: SubDomain,
    full_state_subdomain: SubDomain,
    sequence_subdomain: SubDomain,
}

impl DataPoint {
    /// 起始步
    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// 序列长度
    #[inline]
    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// 压缩空间窗口
    pub fn compressed_subdomain(&self) -> &SubDomain {
        &self.compressed_subdomain
    }

    /// 起始状态窗口
    pub fn full_state_subdomain(&self) -> &SubDomain {
        &self.full_state_subdomain
    }

    /// 序列各步共用的状态窗口
    pub fn sequence_subdomain(&self) -> &SubDomain {
        &self.sequence_subdomain
    }

    /// 序列覆盖的迭代步 `[index, index + sequence_length)`
    pub fn steps(&self) -> Range<u64> {
        self.index..self.index + self.sequence_length as u64
    }

    /// 序列化为索引文件中的一行（含换行符）
    pub fn to_index_line(&self) -> String {
        let mut line = String::new();
        let _ = write!(line, "{},{},", self.index, self.sequence_length);
        let fields = self
            .full_state_subdomain
            .pos()
            .iter()
            .chain(self.full_state_subdomain.size())
            .chain(self.sequence_subdomain.pos())
            .chain(self.sequence_subdomain.size());
        for value in fields {
            let _ = write!(line, "{},", value);
        }
        line.push('\n');
        line
    }
}

/// 索引文件中一行的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// 起始步
    pub index: u64,
    /// 序列长度
    pub sequence_length: usize,
    /// 起始状态窗口
    pub full_state_subdomain: SubDomain,
    /// 序列状态窗口
    pub sequence_subdomain: SubDomain,
}

impl IndexRecord {
    /// 解析一行，行尾逗号与空白可有可无
    pub fn parse(line: &str) -> LnResult<Self> {
        let trimmed = line.trim();
        let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);
        ensure!(!trimmed.is_empty(), LnError::invalid_input("empty index line"));

        let values = trimmed
            .split(',')
            .map(|field| {
                field
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| LnError::invalid_input(format!("invalid integer field '{}'", field)))
            })
            .collect::<LnResult<Vec<i64>>>()?;

        ensure!(
            values.len() >= 6 && (values.len() - 2) % 4 == 0,
            LnError::invalid_input(format!(
                "expected 2 + 4*rank fields, found {}",
                values.len()
            ))
        );
        ensure!(
            values[0] >= 0,
            LnError::invalid_input(format!("negative index {}", values[0]))
        );
        ensure!(
            values[1] >= 1,
            LnError::invalid_input(format!("sequence length {} must be at least 1", values[1]))
        );

        let rank = (values.len() - 2) / 4;
        let field = |k: usize| &values[2 + k * rank..2 + (k + 1) * rank];
        Ok(Self {
            index: values[0] as u64,
            sequence_length: values[1] as usize,
            full_state_subdomain: SubDomain::new(field(0), field(1)),
            sequence_subdomain: SubDomain::new(field(2), field(3)),
        })
    }
}

/// 数据点几何：状态换算器与序列换算器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointGeometry {
    state_converter: ShapeConverter,
    sequence_converter: ShapeConverter,
}

impl PointGeometry {
    /// 由两个换算器创建
    pub fn new(state_converter: ShapeConverter, sequence_converter: ShapeConverter) -> Self {
        Self {
            state_converter,
            sequence_converter,
        }
    }

    /// 由网络超参数推出
    pub fn from_network(network: &NetworkGeometry) -> LnResult<Self> {
        Ok(Self::new(network.state_encoder()?, network.sequence_path()?))
    }

    /// 状态换算器
    pub fn state_converter(&self) -> &ShapeConverter {
        &self.state_converter
    }

    /// 序列换算器
    pub fn sequence_converter(&self) -> &ShapeConverter {
        &self.sequence_converter
    }

    /// 由压缩窗口推出完整数据点
    pub fn derive(
        &self,
        index: u64,
        sequence_length: usize,
        compressed_subdomain: SubDomain,
    ) -> LnResult<DataPoint> {
        ensure!(
            sequence_length >= 1,
            LnError::invalid_config("sequence_length", "0", "must be at least 1")
        );
        let full_state_subdomain = self.state_converter.expand(&compressed_subdomain)?;
        let sequence_subdomain = self.sequence_converter.expand(&compressed_subdomain)?;
        Ok(DataPoint {
            index,
            sequence_length,
            compressed_subdomain,
            full_state_subdomain,
            sequence_subdomain,
        })
    }

    /// 由索引记录恢复数据点，要求 `expand(contract(full)) == full`
    pub fn restore(&self, record: IndexRecord) -> LnResult<DataPoint> {
        ensure!(
            record.full_state_subdomain.rank() == record.sequence_subdomain.rank(),
            LnError::invalid_input("state and sequence subdomains differ in rank")
        );
        let compressed_subdomain = self.state_converter.contract(&record.full_state_subdomain)?;
        let reexpanded = self.state_converter.expand(&compressed_subdomain)?;
        ensure!(
            reexpanded == record.full_state_subdomain,
            LnError::invalid_input(format!(
                "state window {} is not produced by the state converter (nearest is {})",
                record.full_state_subdomain, reexpanded
            ))
        );
        Ok(DataPoint {
            index: record.index,
            sequence_length: record.sequence_length,
            compressed_subdomain,
            full_state_subdomain: record.full_state_subdomain,
            sequence_subdomain: record.sequence_subdomain,
        })
    }

    /// 序列窗口在压缩空间中的对应窗口
    pub fn sequence_compressed_subdomain(&self, point: &DataPoint) -> LnResult<SubDomain> {
        self.state_converter.contract(&point.sequence_subdomain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> PointGeometry {
        PointGeometry::from_network(&NetworkGeometry::default()).unwrap()
    }

    #[test]
    fn test_derive_invariant() {
        let geometry = geometry();
        let c = SubDomain::new(&[5, 7], &[4, 4]);
        let dp = geometry.derive(12, 3, c.clone()).unwrap();
        assert_eq!(dp.compressed_subdomain(), &c);
        assert_eq!(
            dp.full_state_subdomain(),
            &geometry.state_converter().expand(&c).unwrap()
        );
        assert_eq!(dp.steps(), 12..15);
        assert!(geometry.derive(0, 0, c).is_err());
    }

    #[test]
    fn test_index_line_format() {
        let geometry = PointGeometry::new(ShapeConverter::identity(), ShapeConverter::identity());
        let dp = geometry.derive(4, 2, SubDomain::new(&[-1, 3], &[5, 6])).unwrap();
        assert_eq!(dp.to_index_line(), "4,2,-1,3,5,6,-1,3,5,6,\n");
    }

    #[test]
    fn test_line_roundtrip() {
        let geometry = geometry();
        let dp = geometry.derive(7, 5, SubDomain::new(&[1, -2, 3], &[2, 3, 4])).unwrap();
        let record = IndexRecord::parse(&dp.to_index_line()).unwrap();
        assert_eq!(record.index, 7);
        assert_eq!(record.sequence_length, 5);
        let restored = geometry.restore(record).unwrap();
        assert_eq!(restored, dp);
        assert_eq!(restored.to_index_line(), dp.to_index_line());
    }

    #[test]
    fn test_parse_tolerates_missing_trailing_comma() {
        let record = IndexRecord::parse(" 3, 1, 0, 10, 0, 10 ").unwrap();
        assert_eq!(record.full_state_subdomain, SubDomain::new(&[0], &[10]));
        assert_eq!(record.sequence_subdomain, SubDomain::new(&[0], &[10]));
    }

    #[test]
    fn test_parse_errors() {
        assert!(IndexRecord::parse("").is_err());
        assert!(IndexRecord::parse("1,2,3,").is_err());
        assert!(IndexRecord::parse("1,2,a,4,5,6,").is_err());
        assert!(IndexRecord::parse("-1,2,0,4,0,4,").is_err());
        assert!(IndexRecord::parse("1,0,0,4,0,4,").is_err());
        assert!(IndexRecord::parse("1,2,0,0,4,4,0,0,4,4,").is_ok());
        assert!(IndexRecord::parse("1,2,0,0,4,4,0,0,4,").is_err());
    }

    #[test]
    fn test_restore_rejects_foreign_window() {
        let geometry = geometry();
        let record = IndexRecord::parse("0,1,0,0,67,66,0,0,80,80,").unwrap();
        assert!(geometry.restore(record).is_err());
    }

    #[test]
    fn test_sequence_compressed_subdomain() {
        let geometry = geometry();
        let c = SubDomain::new(&[0, 0], &[8, 8]);
        let dp = geometry.derive(0, 2, c).unwrap();
        let seq_c = geometry.sequence_compressed_subdomain(&dp).unwrap();
        // 序列窗口编码后恰好是压缩映射所需的输入窗口
        let mapping = NetworkGeometry::default().compression_mapping().unwrap();
        assert_eq!(mapping.contract(&seq_c).unwrap(), *dp.compressed_subdomain());
    }
}
