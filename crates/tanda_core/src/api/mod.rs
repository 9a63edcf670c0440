pub mod envelope;
pub mod lottery_json;

pub use envelope::{ApiError, ApiResponse, ResponseMeta, INVALID_REQUEST, NOT_FOUND};
pub use lottery_json::{
    CompleteTurnRequest, ConductOptions, ConductRequest, ConductResponse, LotteryApi,
    LotteryResultEntry, ReconductRequest,
};
