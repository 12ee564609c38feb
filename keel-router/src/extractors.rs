use bytes::Bytes;
use keel_http::LocalBoxFuture;
use keel_server::{HandlerError, HandlerResult, HttpContext, HttpHandler, Next};

/// A named parameter source for function-typed routes.
///
/// Implement for custom sources (headers, cookies, services) to extend the
/// built-in [`PathFragment`] and [`Query`] extractors.
pub trait Extractor {
    type Output;

    fn extract(&self, context: &mut HttpContext) -> Result<Self::Output, HandlerError>;
}

/// Extracts a path segment by 1-based index; missing segments yield an
/// empty value.
pub struct PathFragment(pub usize);

impl Extractor for PathFragment {
    type Output = Bytes;

    fn extract(&self, context: &mut HttpContext) -> Result<Bytes, HandlerError> {
        if self.0 == 0 {
            return Ok(Bytes::new());
        }
        Ok(context
            .request
            .uri()
            .path_fragment(self.0 - 1)
            .cloned()
            .unwrap_or_default())
    }
}

/// Extracts a query parameter by name; missing parameters yield an empty
/// value.
pub struct Query(pub &'static str);

impl Extractor for Query {
    type Output = Bytes;

    fn extract(&self, context: &mut HttpContext) -> Result<Bytes, HandlerError> {
        Ok(context
            .request
            .uri()
            .query(self.0.as_bytes())
            .cloned()
            .unwrap_or_default())
    }
}

/// A tuple of extractors resolved together before the route function runs.
pub trait ExtractorSet {
    type Output;

    fn extract_all(&self, context: &mut HttpContext) -> Result<Self::Output, HandlerError>;
}

macro_rules! impl_extractor_set {
    ( $( $name:ident : $index:tt ),+ ) => {
        impl<$( $name: Extractor ),+> ExtractorSet for ( $( $name, )+ ) {
            type Output = ( $( $name::Output, )+ );

            fn extract_all(
                &self,
                context: &mut HttpContext,
            ) -> Result<Self::Output, HandlerError> {
                Ok(( $( self.$index.extract(context)?, )+ ))
            }
        }
    };
}

impl_extractor_set!(A: 0);
impl_extractor_set!(A: 0, B: 1);
impl_extractor_set!(A: 0, B: 1, C: 2);
impl_extractor_set!(A: 0, B: 1, C: 2, D: 3);

impl ExtractorSet for () {
    type Output = ();

    fn extract_all(&self, _context: &mut HttpContext) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Route handler that resolves a tuple of extractors against the context
/// and passes the values to a function.
pub struct ParamsFunctionHandler<E, F> {
    extractors: E,
    func: F,
}

impl<E, F> ParamsFunctionHandler<E, F>
where
    E: ExtractorSet,
    F: for<'a> Fn(&'a mut HttpContext, E::Output) -> LocalBoxFuture<'a, HandlerResult>,
{
    pub fn new(extractors: E, func: F) -> Self {
        Self { extractors, func }
    }
}

impl<E, F> HttpHandler for ParamsFunctionHandler<E, F>
where
    E: ExtractorSet,
    F: for<'a> Fn(&'a mut HttpContext, E::Output) -> LocalBoxFuture<'a, HandlerResult>,
{
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        match self.extractors.extract_all(context) {
            Ok(values) => (self.func)(context, values),
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }
}
