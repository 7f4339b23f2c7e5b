// crates/ln_workflow/src/encoder.rs

//! 状态编码器接口
//!
//! 编码器（自编码网络的编码半部）由外部提供，这里只约定同步调用形式：
//! 输入带前置批次维，输出同样带批次维。

use ndarray::{ArrayD, ArrayViewD, Axis};

use crate::error::{WorkflowError, WorkflowResult};

/// 状态编码器
pub trait StateEncoder: Send + Sync {
    /// 编码原始状态，`batch` 形状为 `[n, spatial.., channels]`
    fn encode_state(&self, batch: ArrayViewD<'_, f32>) -> WorkflowResult<ArrayD<f32>>;

    /// 编码边界
    fn encode_boundary(&self, batch: ArrayViewD<'_, f32>) -> WorkflowResult<ArrayD<f32>>;
}

/// 编码对象种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EncodeTarget {
    State,
    Boundary,
}

/// 对单个数组编码：加批次维、调用编码器、去批次维
pub(crate) fn encode_one(
    encoder: &dyn StateEncoder,
    array: &ArrayD<f32>,
    target: EncodeTarget,
) -> WorkflowResult<ArrayD<f32>> {
    let batch = array.view().insert_axis(Axis(0));
    let encoded = match target {
        EncodeTarget::State => encoder.encode_state(batch)?,
        EncodeTarget::Boundary => encoder.encode_boundary(batch)?,
    };
    if encoded.ndim() < 2 || encoded.shape()[0] != 1 {
        return Err(WorkflowError::Encoder(format!(
            "expected output with batch axis of length 1, got shape {:?}",
            encoded.shape()
        )));
    }
    Ok(encoded.index_axis(Axis(0), 0).to_owned())
}
