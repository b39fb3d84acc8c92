use donation_engine::traits::{PaymentProvider, PendingPush, ProviderError, ProviderStatus, PushAccepted, PushRequest};
use mockall::mock;

mock! {
    pub Provider {}
    impl PaymentProvider for Provider {
        fn name(&self) -> &'static str;
        async fn initiate_push(&self, request: &PushRequest) -> Result<PushAccepted, ProviderError>;
        async fn query_push(&self, pending: &PendingPush) -> Result<ProviderStatus, ProviderError>;
    }
}
