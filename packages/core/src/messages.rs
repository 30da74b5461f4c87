//! User-facing localized messages
//!
//! Delivered verbatim through `SuccessCallback.notify`; both ledger backends
//! and the service façades share these so clients see identical wording no
//! matter which peer served them.

pub const TXN_SUCCESS: &str = "Giao dịch thành công!";
pub const LOGIN_SUCCESS: &str = "Đăng nhập thành công!";
pub const LOGIN_FAILED: &str = "Đăng nhập thất bại!";
pub const LOGGED_OUT: &str = "Đã logout!";

pub const CARD_NOT_FOUND: &str = "Không tìm thấy thẻ!";
pub const INSUFFICIENT_FUNDS: &str = "Số dư không đủ!";
pub const SELF_TRANSFER: &str = "Không thể chuyển cho chính mình!";
pub const PIN_UNCHANGED: &str = "PIN mới trùng PIN cũ!";
pub const INVALID_AMOUNT: &str = "Số tiền không hợp lệ!";
pub const CARD_EXISTS: &str = "Thẻ đã tồn tại!";
pub const USER_EXISTS: &str = "Người dùng đã tồn tại!";
