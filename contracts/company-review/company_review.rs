//! Interface bindings for the `CompanyReviewContract` deployed on the rollup,
//! plus an in-memory model of its registration rules.

mod model;

pub use model::{CompanyReviewState, Revert};

alloy_sol_types::sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface ICompanyReview {
        /// Returns true when `signer` produced the personal-sign signature `(r, s, v)`
        /// over `messageHash`.
        function verifyWithRVS(address signer, bytes32 messageHash, bytes32 r, bytes32 s, uint8 v) external view returns (bool valid);

        /// Marks `company` as registered. The caller must be the signer of `messageHash`.
        function registerCompany(address company, bytes32 messageHash, bytes32 r, bytes32 s, uint8 v) external;

        function owner() external view returns (address ownerAddress);

        function companies(address company) external view returns (bool registered);
    }
}
