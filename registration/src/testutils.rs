use crate::errors::ApiError;
use crate::remote::MarketingApi;
use crate::types::{ContactId, SegmentId, SegmentName};
use async_trait::async_trait;
use http::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    SearchContact(String),
    CreateContact(String),
    SearchSegment(String),
    CreateSegment(String),
    Subscribe(ContactId, Vec<SegmentId>),
}

#[derive(Default)]
pub(crate) struct State {
    next_id: u64,
    contacts: HashMap<String, ContactId>,
    segments: Vec<(String, SegmentId)>,
    calls: Vec<Call>,
    // Contacts that exist remotely but the next search does not see yet.
    hidden_contacts: HashSet<String>,
}

/// In-memory marketing API. Enforces the same uniqueness the real service
/// does for contact emails, but happily stores duplicate segment names so
/// tests can detect them.
#[derive(Default)]
pub struct FakeMarketingApi {
    pub(crate) state: Mutex<State>,
    pub unconfigured: bool,
    pub failing_segment_creates: HashSet<String>,
    pub failing_segment_searches: HashSet<String>,
    pub fail_contact_search: bool,
    pub contact_create_error: Option<fn() -> ApiError>,
    pub fail_subscribe: bool,
    /// Create always answers with a duplicate-email rejection, while searches
    /// keep returning whatever is stored.
    pub reject_create_as_duplicate: bool,
}

impl FakeMarketingApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(state: &mut State) -> u64 {
        state.next_id += 1;
        state.next_id
    }

    pub fn with_contact(self, email: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = Self::next_id(&mut state);
            state
                .contacts
                .insert(email.into(), ContactId::new(format!("c{id}")));
        }
        self
    }

    /// The contact exists but the first search misses it, as if it were
    /// created by a concurrent request between search and create.
    pub fn with_racing_contact(self, email: &str) -> Self {
        let this = self.with_contact(email);
        this.state
            .lock()
            .unwrap()
            .hidden_contacts
            .insert(email.into());
        this
    }

    pub fn with_segment(self, name: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = Self::next_id(&mut state);
            state
                .segments
                .push((name.into(), SegmentId::new(format!("g{id}"))));
        }
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn contact_count(&self) -> usize {
        self.state.lock().unwrap().contacts.len()
    }

    pub fn segments_named(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .segments
            .iter()
            .filter(|(n, _)| n == name)
            .count()
    }

    pub fn subscriptions(&self) -> Vec<(ContactId, Vec<SegmentId>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Subscribe(contact, ids) => Some((contact, ids)),
                _ => None,
            })
            .collect()
    }
}

fn unavailable() -> ApiError {
    ApiError::Rejection {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: "unavailable".into(),
    }
}

#[async_trait]
impl MarketingApi for FakeMarketingApi {
    fn ensure_configured(&self) -> Result<(), ApiError> {
        match self.unconfigured {
            true => Err(ApiError::Configuration),
            false => Ok(()),
        }
    }

    async fn search_contact(&self, email: &str) -> Result<Option<ContactId>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::SearchContact(email.into()));
        if self.fail_contact_search {
            return Err(unavailable());
        }
        if state.hidden_contacts.remove(email) {
            return Ok(None);
        }
        Ok(state.contacts.get(email).cloned())
    }

    async fn create_contact(&self, _name: &str, email: &str) -> Result<ContactId, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateContact(email.into()));
        if self.reject_create_as_duplicate {
            return Err(ApiError::DuplicateContact);
        }
        if let Some(make_error) = self.contact_create_error {
            return Err(make_error());
        }
        if state.contacts.contains_key(email) {
            return Err(ApiError::DuplicateContact);
        }
        let id = ContactId::new(format!("c{}", Self::next_id(&mut state)));
        state.contacts.insert(email.into(), id.clone());
        Ok(id)
    }

    async fn search_segment(&self, name: &SegmentName) -> Result<Option<SegmentId>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::SearchSegment(name.to_string()));
        if self.failing_segment_searches.contains(name.as_str()) {
            return Err(unavailable());
        }
        Ok(state
            .segments
            .iter()
            .find(|(n, _)| n == name.as_str())
            .map(|(_, id)| id.clone()))
    }

    async fn create_segment(&self, name: &SegmentName) -> Result<SegmentId, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateSegment(name.to_string()));
        if self.failing_segment_creates.contains(name.as_str()) {
            return Err(unavailable());
        }
        let id = SegmentId::new(format!("g{}", Self::next_id(&mut state)));
        state.segments.push((name.to_string(), id.clone()));
        Ok(id)
    }

    async fn subscribe(&self, contact: &ContactId, segments: &[SegmentId]) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Subscribe(contact.clone(), segments.to_vec()));
        if self.fail_subscribe {
            return Err(unavailable());
        }
        Ok(())
    }
}
