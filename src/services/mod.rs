//! Verb-level call support.
//!
//! A [`ServiceCaller`] binds one client to the registry's pipeline builder
//! and executor, and turns HTTP verbs into executed requests. URIs passed to
//! the verb methods are relative to the client's endpoint.

use std::sync::Arc;

use crate::client::ServiceClient;
use crate::errors::ServiceResult;
use crate::pipeline::{Marshaller, PipelineBuilder, RequestExecutor, RequestInvoker, Unmarshaller};
use crate::transport::{HttpMethod, HttpRequest};
use crate::types::{ResponseWrapper, TypedResponseWrapper};

/// Issues requests against one client.
#[derive(Clone)]
pub struct ServiceCaller {
    client: Arc<ServiceClient>,
    pipeline: Arc<dyn PipelineBuilder>,
    executor: Arc<RequestExecutor>,
}

impl ServiceCaller {
    /// Creates a caller for `client`.
    pub fn new(
        client: Arc<ServiceClient>,
        pipeline: Arc<dyn PipelineBuilder>,
        executor: Arc<RequestExecutor>,
    ) -> Self {
        Self {
            client,
            pipeline,
            executor,
        }
    }

    /// Returns the client this caller is bound to.
    pub fn client(&self) -> &Arc<ServiceClient> {
        &self.client
    }

    /// Issues a GET request.
    pub async fn get(&self, uri: &str) -> ServiceResult<ResponseWrapper> {
        self.send(HttpMethod::Get, uri).await
    }

    /// Issues a HEAD request.
    pub async fn head(&self, uri: &str) -> ServiceResult<ResponseWrapper> {
        self.send(HttpMethod::Head, uri).await
    }

    /// Issues a DELETE request.
    pub async fn delete(&self, uri: &str) -> ServiceResult<ResponseWrapper> {
        self.send(HttpMethod::Delete, uri).await
    }

    /// Issues an OPTIONS request.
    pub async fn options(&self, uri: &str) -> ServiceResult<ResponseWrapper> {
        self.send(HttpMethod::Options, uri).await
    }

    /// Issues a POST request with a marshalled body.
    pub async fn post<B, M>(
        &self,
        uri: &str,
        body: &B,
        marshaller: &M,
    ) -> ServiceResult<ResponseWrapper>
    where
        B: ?Sized,
        M: Marshaller<B> + ?Sized,
    {
        self.send_with_body(HttpMethod::Post, uri, body, marshaller).await
    }

    /// Issues a PUT request with a marshalled body.
    pub async fn put<B, M>(
        &self,
        uri: &str,
        body: &B,
        marshaller: &M,
    ) -> ServiceResult<ResponseWrapper>
    where
        B: ?Sized,
        M: Marshaller<B> + ?Sized,
    {
        self.send_with_body(HttpMethod::Put, uri, body, marshaller).await
    }

    /// Issues a GET request and unmarshals the response.
    pub async fn get_entity<T, U>(
        &self,
        uri: &str,
        unmarshaller: &U,
    ) -> ServiceResult<TypedResponseWrapper<T>>
    where
        U: Unmarshaller<T> + ?Sized,
    {
        self.send_entity(HttpMethod::Get, uri, unmarshaller).await
    }

    /// Issues a HEAD request and unmarshals the response.
    pub async fn head_entity<T, U>(
        &self,
        uri: &str,
        unmarshaller: &U,
    ) -> ServiceResult<TypedResponseWrapper<T>>
    where
        U: Unmarshaller<T> + ?Sized,
    {
        self.send_entity(HttpMethod::Head, uri, unmarshaller).await
    }

    /// Issues a DELETE request and unmarshals the response.
    pub async fn delete_entity<T, U>(
        &self,
        uri: &str,
        unmarshaller: &U,
    ) -> ServiceResult<TypedResponseWrapper<T>>
    where
        U: Unmarshaller<T> + ?Sized,
    {
        self.send_entity(HttpMethod::Delete, uri, unmarshaller).await
    }

    /// Issues an OPTIONS request and unmarshals the response.
    pub async fn options_entity<T, U>(
        &self,
        uri: &str,
        unmarshaller: &U,
    ) -> ServiceResult<TypedResponseWrapper<T>>
    where
        U: Unmarshaller<T> + ?Sized,
    {
        self.send_entity(HttpMethod::Options, uri, unmarshaller).await
    }

    /// Issues a POST request with a marshalled body and unmarshals the response.
    pub async fn post_entity<T, B, M, U>(
        &self,
        uri: &str,
        body: &B,
        marshaller: &M,
        unmarshaller: &U,
    ) -> ServiceResult<TypedResponseWrapper<T>>
    where
        B: ?Sized,
        M: Marshaller<B> + ?Sized,
        U: Unmarshaller<T> + ?Sized,
    {
        self.send_entity_with_body(HttpMethod::Post, uri, body, marshaller, unmarshaller)
            .await
    }

    /// Issues a PUT request with a marshalled body and unmarshals the response.
    pub async fn put_entity<T, B, M, U>(
        &self,
        uri: &str,
        body: &B,
        marshaller: &M,
        unmarshaller: &U,
    ) -> ServiceResult<TypedResponseWrapper<T>>
    where
        B: ?Sized,
        M: Marshaller<B> + ?Sized,
        U: Unmarshaller<T> + ?Sized,
    {
        self.send_entity_with_body(HttpMethod::Put, uri, body, marshaller, unmarshaller)
            .await
    }

    async fn send(&self, method: HttpMethod, uri: &str) -> ServiceResult<ResponseWrapper> {
        let request = self.build_request(method, uri);
        self.executor
            .handle(&self.client, self.pipeline.build(&self.client), request)
            .await
    }

    async fn send_with_body<B, M>(
        &self,
        method: HttpMethod,
        uri: &str,
        body: &B,
        marshaller: &M,
    ) -> ServiceResult<ResponseWrapper>
    where
        B: ?Sized,
        M: Marshaller<B> + ?Sized,
    {
        let (pipeline, request) = self.prepare_with_body(method, uri, body, marshaller);
        self.executor.handle(&self.client, pipeline, request).await
    }

    async fn send_entity<T, U>(
        &self,
        method: HttpMethod,
        uri: &str,
        unmarshaller: &U,
    ) -> ServiceResult<TypedResponseWrapper<T>>
    where
        U: Unmarshaller<T> + ?Sized,
    {
        let request = self.build_request(method, uri);
        self.executor
            .handle_entity(&self.client, self.pipeline.build(&self.client), request, unmarshaller)
            .await
    }

    async fn send_entity_with_body<T, B, M, U>(
        &self,
        method: HttpMethod,
        uri: &str,
        body: &B,
        marshaller: &M,
        unmarshaller: &U,
    ) -> ServiceResult<TypedResponseWrapper<T>>
    where
        B: ?Sized,
        M: Marshaller<B> + ?Sized,
        U: Unmarshaller<T> + ?Sized,
    {
        let (pipeline, request) = self.prepare_with_body(method, uri, body, marshaller);
        self.executor
            .handle_entity(&self.client, pipeline, request, unmarshaller)
            .await
    }

    /// Marshals the body first; a marshalling failure becomes the pre-flight
    /// failure of the request.
    fn prepare_with_body<B, M>(
        &self,
        method: HttpMethod,
        uri: &str,
        body: &B,
        marshaller: &M,
    ) -> (ServiceResult<RequestInvoker>, HttpRequest)
    where
        B: ?Sized,
        M: Marshaller<B> + ?Sized,
    {
        let request = self.build_request(method, uri);
        match marshaller.marshal(body) {
            Ok(bytes) => {
                let request = request
                    .with_header("content-type", marshaller.content_type())
                    .with_body(bytes);
                (self.pipeline.build(&self.client), request)
            }
            Err(e) => (Err(e), request),
        }
    }

    fn build_request(&self, method: HttpMethod, uri: &str) -> HttpRequest {
        let endpoint = self.client.endpoint();
        let mut request = HttpRequest::new(method, endpoint.url_for(uri));
        for (name, value) in &endpoint.config.default_headers {
            request = request.with_header(name.clone(), value.clone());
        }
        if let Some(timeout) = endpoint.config.request_timeout {
            request = request.with_timeout(timeout);
        }
        request
    }
}

impl std::fmt::Debug for ServiceCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCaller")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
