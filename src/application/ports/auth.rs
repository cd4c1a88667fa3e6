/// 認証状態の参照。リモートに触れる処理はすべてこれでゲートする。
pub trait AuthProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;
}
