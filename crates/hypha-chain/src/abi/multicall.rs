//! Multicall3 bindings
//!
//! Only `aggregate3` is needed: it carries a per-call `allowFailure` flag and
//! returns a `(success, returnData)` pair for every element.

use alloy::sol;

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}
