//! Identity catalog - profiles and definitional entities
//!
//! Canonical, mutable-by-replacement records, each tenant-scoped. Profile
//! updates are full-state replacements (last-writer-wins by commit order);
//! definitional entities carry a content-addressed identity computed once
//! at creation. Side effects of writes (enrichment enqueue) are explicit
//! observer callbacks, not storage triggers.

use crate::registry::TenantRegistry;
use cairn_core::{
    CairnResult, Campaign, CampaignId, CampaignStatus, CatalogError, Channel, ConsentState,
    EmbeddingStatus, EmbeddingVector, EntityKind, EventKey, IsolationError, MarketingEvent,
    MessageTemplate, Profile, ProfileKey, StorageError, TemplateId, TenantId,
};
use cairn_context::TenantContext;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Observer of catalog writes. Fired after a definitional entity's
/// embeddable content changes (insert or relevant-field update).
pub trait CatalogObserver: Send + Sync {
    fn embeddable_content_changed(&self, tenant_id: TenantId, event_key: EventKey);
}

/// The identity catalog.
pub struct IdentityCatalog {
    registry: Arc<TenantRegistry>,
    profiles: Arc<RwLock<HashMap<(TenantId, ProfileKey), Profile>>>,
    campaigns: Arc<RwLock<HashMap<CampaignId, Campaign>>>,
    events: Arc<RwLock<HashMap<EventKey, MarketingEvent>>>,
    templates: Arc<RwLock<HashMap<TemplateId, MessageTemplate>>>,
    observers: Arc<RwLock<Vec<Arc<dyn CatalogObserver>>>>,
}

impl IdentityCatalog {
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self {
            registry,
            profiles: Arc::new(RwLock::new(HashMap::new())),
            campaigns: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(RwLock::new(HashMap::new())),
            templates: Arc::new(RwLock::new(HashMap::new())),
            observers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a write observer.
    pub fn register_observer(&self, observer: Arc<dyn CatalogObserver>) -> CairnResult<()> {
        self.observers
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .push(observer);
        Ok(())
    }

    fn notify_content_changed(&self, tenant_id: TenantId, event_key: EventKey) -> CairnResult<()> {
        let observers = self
            .observers
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        for observer in observers.iter() {
            observer.embeddable_content_changed(tenant_id, event_key);
        }
        Ok(())
    }

    // === Profile Operations ===

    /// Upsert a profile: a full-state replacement of computed fields.
    ///
    /// The record is stamped with the bound tenant, so a caller cannot
    /// write into another tenant's scope regardless of what the struct
    /// carried. Last-writer-wins by commit order; no diffing or merging.
    pub fn upsert_profile(&self, ctx: &TenantContext, mut profile: Profile) -> CairnResult<Profile> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        profile.tenant_id = tenant_id;
        profile.updated_at = Utc::now();
        let mut profiles = self.profiles_write()?;
        debug!(tenant_id = %tenant_id, profile_key = %profile.profile_key, "profile upserted");
        profiles.insert((tenant_id, profile.profile_key.clone()), profile.clone());
        Ok(profile)
    }

    /// Get a profile by its tenant-unique external key.
    pub fn get_profile(
        &self,
        ctx: &TenantContext,
        profile_key: &str,
    ) -> CairnResult<Option<Profile>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(None);
        };
        let profiles = self.profiles_read()?;
        Ok(profiles.get(&(tenant_id, profile_key.to_string())).cloned())
    }

    /// All profiles under the bound tenant (the snapshot engine's
    /// evaluation input). Empty for an unbound context.
    pub fn all_profiles(&self, ctx: &TenantContext) -> CairnResult<Vec<Profile>> {
        self.filter_profiles(ctx, |_| true)
    }

    /// Profiles matching an arbitrary predicate, tenant-filtered.
    fn filter_profiles(
        &self,
        ctx: &TenantContext,
        pred: impl Fn(&Profile) -> bool,
    ) -> CairnResult<Vec<Profile>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(Vec::new());
        };
        let profiles = self.profiles_read()?;
        let mut matched: Vec<Profile> = profiles
            .values()
            .filter(|p| p.tenant_id == tenant_id && pred(p))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.profile_key.cmp(&b.profile_key));
        Ok(matched)
    }

    /// Profiles reachable at an email address (primary or secondary).
    pub fn profiles_by_email(&self, ctx: &TenantContext, email: &str) -> CairnResult<Vec<Profile>> {
        let needle = email.trim().to_lowercase();
        self.filter_profiles(ctx, |p| {
            p.primary_email
                .as_ref()
                .map(|c| c.value() == needle)
                .unwrap_or(false)
                || p.secondary_emails.iter().any(|c| c.value() == needle)
        })
    }

    /// Profiles reachable at a phone number (primary or secondary).
    pub fn profiles_by_phone(&self, ctx: &TenantContext, phone: &str) -> CairnResult<Vec<Profile>> {
        self.filter_profiles(ctx, |p| {
            p.primary_phone
                .as_ref()
                .map(|c| c.value() == phone)
                .unwrap_or(false)
                || p.secondary_phones.iter().any(|c| c.value() == phone)
        })
    }

    /// Profiles carrying a data label (e.g. "VIP", "WHALE").
    pub fn profiles_by_data_label(
        &self,
        ctx: &TenantContext,
        label: &str,
    ) -> CairnResult<Vec<Profile>> {
        self.filter_profiles(ctx, |p| p.data_labels.iter().any(|l| l == label))
    }

    /// Profiles living in a city (exact match).
    pub fn profiles_by_living_city(
        &self,
        ctx: &TenantContext,
        city: &str,
    ) -> CairnResult<Vec<Profile>> {
        self.filter_profiles(ctx, |p| p.living_city.as_deref() == Some(city))
    }

    /// Profiles interested in a content keyword.
    pub fn profiles_by_content_keyword(
        &self,
        ctx: &TenantContext,
        keyword: &str,
    ) -> CairnResult<Vec<Profile>> {
        self.filter_profiles(ctx, |p| p.content_keywords.iter().any(|k| k == keyword))
    }

    /// Profiles reachable via a media channel.
    pub fn profiles_by_media_channel(
        &self,
        ctx: &TenantContext,
        channel: Channel,
    ) -> CairnResult<Vec<Profile>> {
        self.filter_profiles(ctx, |p| p.media_channels.contains(&channel))
    }

    /// Like `profiles_by_media_channel`, but accepts the alias and variant
    /// channel names upstream callers send ("ZALO", "web notification", ...).
    pub fn profiles_by_media_channel_name(
        &self,
        ctx: &TenantContext,
        channel_name: &str,
    ) -> CairnResult<Vec<Profile>> {
        let channel = Channel::parse(channel_name)?;
        self.profiles_by_media_channel(ctx, channel)
    }

    /// Profiles tagged with a semantic behavioral label. Queries the
    /// profile summary, not the raw event log.
    pub fn profiles_by_behavioral_event(
        &self,
        ctx: &TenantContext,
        label: &str,
    ) -> CairnResult<Vec<Profile>> {
        self.filter_profiles(ctx, |p| p.behavioral_events.iter().any(|l| l == label))
    }

    /// Profiles holding a job title.
    pub fn profiles_by_job_title(
        &self,
        ctx: &TenantContext,
        title: &str,
    ) -> CairnResult<Vec<Profile>> {
        self.filter_profiles(ctx, |p| p.job_titles.iter().any(|t| t == title))
    }

    /// Current members of a segment id (live membership, not a snapshot).
    pub fn profiles_by_segment(
        &self,
        ctx: &TenantContext,
        segment_id: &str,
    ) -> CairnResult<Vec<Profile>> {
        self.filter_profiles(ctx, |p| p.in_segment(segment_id))
    }

    /// Profiles currently on a journey map.
    pub fn profiles_by_journey(
        &self,
        ctx: &TenantContext,
        journey_id: &str,
    ) -> CairnResult<Vec<Profile>> {
        self.filter_profiles(ctx, |p| p.journey_maps.iter().any(|j| j.id == journey_id))
    }

    /// Profiles with a topic affinity at or above a minimum interest score,
    /// ordered by score descending.
    pub fn profiles_by_affinity(
        &self,
        ctx: &TenantContext,
        topic: &str,
        min_score: f64,
    ) -> CairnResult<Vec<Profile>> {
        let mut matched = self.filter_profiles(ctx, |p| {
            p.affinity_for(topic)
                .map(|score| score >= min_score)
                .unwrap_or(false)
        })?;
        matched.sort_by(|a, b| {
            let sa = a.affinity_for(topic).unwrap_or(0.0);
            let sb = b.affinity_for(topic).unwrap_or(0.0);
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(matched)
    }

    // === Consent ===

    /// Whether dispatch on this channel is permitted for the profile.
    /// Deny unless explicitly granted; deny for unbound contexts and for
    /// unknown profiles. Enforcement is the dispatcher's obligation; this
    /// is the read it is contractually required to make.
    pub fn consent_allows(
        &self,
        ctx: &TenantContext,
        profile_key: &str,
        channel: Channel,
    ) -> CairnResult<bool> {
        Ok(self
            .get_profile(ctx, profile_key)?
            .map(|p| p.consent_for(channel) == ConsentState::Granted)
            .unwrap_or(false))
    }

    /// Record a consent state change for a profile.
    pub fn set_consent(
        &self,
        ctx: &TenantContext,
        profile_key: &str,
        channel: Channel,
        state: ConsentState,
    ) -> CairnResult<()> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        let mut profiles = self.profiles_write()?;
        let profile = profiles
            .get_mut(&(tenant_id, profile_key.to_string()))
            .ok_or_else(|| CatalogError::NotFound {
                kind: EntityKind::Profile,
                key: profile_key.to_string(),
            })?;
        profile.consents.insert(channel, state);
        profile.updated_at = Utc::now();
        Ok(())
    }

    // === Campaign Operations ===

    /// Create a draft campaign under the bound tenant.
    pub fn create_campaign(&self, ctx: &TenantContext, name: &str) -> CairnResult<Campaign> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        let campaign = Campaign::new(tenant_id, name);
        let mut campaigns = self.campaigns_write()?;
        campaigns.insert(campaign.campaign_id, campaign.clone());
        Ok(campaign)
    }

    pub fn get_campaign(
        &self,
        ctx: &TenantContext,
        campaign_id: CampaignId,
    ) -> CairnResult<Option<Campaign>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(None);
        };
        let campaigns = self.campaigns_read()?;
        Ok(campaigns
            .get(&campaign_id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    pub fn set_campaign_status(
        &self,
        ctx: &TenantContext,
        campaign_id: CampaignId,
        status: CampaignStatus,
    ) -> CairnResult<()> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        let mut campaigns = self.campaigns_write()?;
        let campaign = campaigns
            .get_mut(&campaign_id)
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or_else(|| CatalogError::NotFound {
                kind: EntityKind::Campaign,
                key: campaign_id.to_string(),
            })?;
        campaign.status = status;
        campaign.updated_at = Utc::now();
        Ok(())
    }

    // === Marketing Event Operations ===

    /// Insert a definitional entity.
    ///
    /// The entity arrives with its content-addressed key already derived;
    /// its tenant must match the bound tenant (the key binds it). Inserting
    /// an existing key is `DuplicateIdentity` - identities that differ only
    /// by creation timestamp are distinct and both legal.
    pub fn create_event(
        &self,
        ctx: &TenantContext,
        event: MarketingEvent,
    ) -> CairnResult<MarketingEvent> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        if event.tenant_id != tenant_id {
            return Err(IsolationError::TenantMismatch {
                bound_tenant: tenant_id,
                entity_tenant: event.tenant_id,
            }
            .into());
        }
        {
            let mut events = self.events_write()?;
            if events.contains_key(&event.event_key) {
                return Err(CatalogError::DuplicateIdentity {
                    kind: EntityKind::MarketingEvent,
                    key: event.event_key.to_string(),
                }
                .into());
            }
            debug!(tenant_id = %tenant_id, event_key = %event.event_key, "marketing event created");
            events.insert(event.event_key, event.clone());
        }
        self.notify_content_changed(tenant_id, event.event_key)?;
        Ok(event)
    }

    pub fn get_event(
        &self,
        ctx: &TenantContext,
        event_key: EventKey,
    ) -> CairnResult<Option<MarketingEvent>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(None);
        };
        let events = self.events_read()?;
        Ok(events
            .get(&event_key)
            .filter(|e| e.tenant_id == tenant_id)
            .cloned())
    }

    pub fn events_by_campaign(
        &self,
        ctx: &TenantContext,
        campaign_id: CampaignId,
    ) -> CairnResult<Vec<MarketingEvent>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(Vec::new());
        };
        let events = self.events_read()?;
        let mut matched: Vec<MarketingEvent> = events
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.campaign_id == campaign_id)
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.created_at);
        Ok(matched)
    }

    /// Update an event's content fields. Identity never changes; the
    /// embedding status resets to Pending and the enqueue hook fires when
    /// embeddable content actually changed.
    pub fn update_event_content(
        &self,
        ctx: &TenantContext,
        event_key: EventKey,
        name: Option<&str>,
        description: Option<&str>,
        message: Option<&str>,
    ) -> CairnResult<MarketingEvent> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        let updated = {
            let mut events = self.events_write()?;
            let event = events
                .get_mut(&event_key)
                .filter(|e| e.tenant_id == tenant_id)
                .ok_or_else(|| CatalogError::NotFound {
                    kind: EntityKind::MarketingEvent,
                    key: event_key.to_string(),
                })?;
            let before = event.embeddable_content();
            if let Some(name) = name {
                event.name = name.to_string();
            }
            if let Some(description) = description {
                event.description = Some(description.to_string());
            }
            if let Some(message) = message {
                event.message = message.to_string();
            }
            event.updated_at = Utc::now();
            let changed = event.embeddable_content() != before;
            if changed {
                event.embedding_status = EmbeddingStatus::Pending;
            }
            (event.clone(), changed)
        };
        let (event, changed) = updated;
        if changed {
            self.notify_content_changed(tenant_id, event_key)?;
        }
        Ok(event)
    }

    /// Store a computed embedding on an event. Internal wiring for job
    /// completion; takes the job's tenant directly (workers have no
    /// session context of their own).
    pub(crate) fn attach_event_embedding(
        &self,
        tenant_id: TenantId,
        event_key: EventKey,
        vector: EmbeddingVector,
    ) -> CairnResult<()> {
        let mut events = self.events_write()?;
        let event = events
            .get_mut(&event_key)
            .filter(|e| e.tenant_id == tenant_id)
            .ok_or_else(|| CatalogError::NotFound {
                kind: EntityKind::MarketingEvent,
                key: event_key.to_string(),
            })?;
        event.embedding = Some(vector);
        event.embedding_status = EmbeddingStatus::Ready;
        event.updated_at = Utc::now();
        Ok(())
    }

    /// Mark an event's enrichment terminally failed.
    pub(crate) fn mark_event_embedding_failed(
        &self,
        tenant_id: TenantId,
        event_key: EventKey,
    ) -> CairnResult<()> {
        let mut events = self.events_write()?;
        let event = events
            .get_mut(&event_key)
            .filter(|e| e.tenant_id == tenant_id)
            .ok_or_else(|| CatalogError::NotFound {
                kind: EntityKind::MarketingEvent,
                key: event_key.to_string(),
            })?;
        event.embedding_status = EmbeddingStatus::Failed;
        event.updated_at = Utc::now();
        Ok(())
    }

    // === Template Operations ===

    pub fn create_template(
        &self,
        ctx: &TenantContext,
        name: &str,
        channel: Channel,
        body: &str,
    ) -> CairnResult<MessageTemplate> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        let template = MessageTemplate::new(tenant_id, name, channel, body);
        let mut templates = self.templates_write()?;
        templates.insert(template.template_id, template.clone());
        Ok(template)
    }

    pub fn get_template(
        &self,
        ctx: &TenantContext,
        template_id: TemplateId,
    ) -> CairnResult<Option<MessageTemplate>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(None);
        };
        let templates = self.templates_read()?;
        Ok(templates
            .get(&template_id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned())
    }

    // === Lock helpers ===

    fn profiles_read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<(TenantId, ProfileKey), Profile>>, StorageError>
    {
        self.profiles.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn profiles_write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<(TenantId, ProfileKey), Profile>>, StorageError>
    {
        self.profiles.write().map_err(|_| StorageError::LockPoisoned)
    }

    fn campaigns_read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<CampaignId, Campaign>>, StorageError> {
        self.campaigns.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn campaigns_write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<CampaignId, Campaign>>, StorageError> {
        self.campaigns.write().map_err(|_| StorageError::LockPoisoned)
    }

    fn events_read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<EventKey, MarketingEvent>>, StorageError>
    {
        self.events.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn events_write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<EventKey, MarketingEvent>>, StorageError>
    {
        self.events.write().map_err(|_| StorageError::LockPoisoned)
    }

    fn templates_read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<TemplateId, MessageTemplate>>, StorageError>
    {
        self.templates.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn templates_write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<TemplateId, MessageTemplate>>, StorageError>
    {
        self.templates.write().map_err(|_| StorageError::LockPoisoned)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::{CairnError, ContactPoint};
    use std::sync::Mutex;

    fn setup() -> (Arc<TenantRegistry>, IdentityCatalog, TenantContext) {
        let registry = Arc::new(TenantRegistry::new());
        let tenant = registry.create("acme").unwrap();
        let catalog = IdentityCatalog::new(registry.clone());
        let ctx = registry.bind(tenant.tenant_id).unwrap();
        (registry, catalog, ctx)
    }

    #[test]
    fn test_upsert_stamps_bound_tenant() {
        let (_registry, catalog, ctx) = setup();
        // Constructed with a bogus tenant; the catalog stamps the bound one.
        let profile = Profile::new(uuid::Uuid::now_v7(), "p_01");
        let stored = catalog.upsert_profile(&ctx, profile).unwrap();
        assert_eq!(Some(stored.tenant_id), ctx.tenant_id());
        assert!(catalog.get_profile(&ctx, "p_01").unwrap().is_some());
    }

    #[test]
    fn test_upsert_is_full_replacement() {
        let (_registry, catalog, ctx) = setup();
        let tenant_id = ctx.tenant_id().unwrap();
        let first = Profile::new(tenant_id, "p_01")
            .with_data_labels(vec!["VIP".to_string(), "WHALE".to_string()]);
        catalog.upsert_profile(&ctx, first).unwrap();

        let second = Profile::new(tenant_id, "p_01").with_data_labels(vec!["CHURNED".to_string()]);
        catalog.upsert_profile(&ctx, second).unwrap();

        let stored = catalog.get_profile(&ctx, "p_01").unwrap().unwrap();
        // No merging: the old labels are gone.
        assert_eq!(stored.data_labels, vec!["CHURNED".to_string()]);
    }

    #[test]
    fn test_unbound_reads_are_empty_writes_fail() {
        let (_registry, catalog, ctx) = setup();
        let tenant_id = ctx.tenant_id().unwrap();
        catalog
            .upsert_profile(&ctx, Profile::new(tenant_id, "p_01"))
            .unwrap();

        let unbound = TenantContext::unbound();
        assert!(catalog.get_profile(&unbound, "p_01").unwrap().is_none());
        assert!(catalog.all_profiles(&unbound).unwrap().is_empty());
        assert!(!catalog.consent_allows(&unbound, "p_01", Channel::Email).unwrap());

        let write = catalog.upsert_profile(&unbound, Profile::new(tenant_id, "p_02"));
        assert!(matches!(
            write,
            Err(CairnError::Isolation(IsolationError::NoTenantBound))
        ));
    }

    #[test]
    fn test_cross_tenant_reads_see_nothing() {
        let (registry, catalog, ctx) = setup();
        let tenant_id = ctx.tenant_id().unwrap();
        catalog
            .upsert_profile(
                &ctx,
                Profile::new(tenant_id, "p_01").with_data_labels(vec!["VIP".to_string()]),
            )
            .unwrap();

        let other = registry.create("globex").unwrap();
        let other_ctx = registry.bind(other.tenant_id).unwrap();
        assert!(catalog.get_profile(&other_ctx, "p_01").unwrap().is_none());
        assert!(catalog
            .profiles_by_data_label(&other_ctx, "VIP")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_profile_query_predicates() {
        let (_registry, catalog, ctx) = setup();
        let tenant_id = ctx.tenant_id().unwrap();
        let mut profile = Profile::new(tenant_id, "p_01")
            .with_email(ContactPoint::email("an@example.com").unwrap())
            .with_data_labels(vec!["VIP".to_string()])
            .with_media_channels(vec![Channel::Email]);
        profile.living_city = Some("Saigon".to_string());
        profile.content_keywords = vec!["dividends".to_string()];
        profile.job_titles = vec!["Analyst".to_string()];
        profile.behavioral_events = vec!["VIEW_STOCK".to_string()];
        profile.affinities.push(cairn_core::AffinityScore {
            topic: "AAPL".to_string(),
            raw_score: 500.0,
            interest_score: 0.83,
            last_interaction: None,
        });
        catalog.upsert_profile(&ctx, profile).unwrap();

        assert_eq!(catalog.profiles_by_email(&ctx, "AN@example.com").unwrap().len(), 1);
        assert_eq!(catalog.profiles_by_data_label(&ctx, "VIP").unwrap().len(), 1);
        assert_eq!(catalog.profiles_by_living_city(&ctx, "Saigon").unwrap().len(), 1);
        assert_eq!(
            catalog.profiles_by_content_keyword(&ctx, "dividends").unwrap().len(),
            1
        );
        assert_eq!(
            catalog.profiles_by_media_channel(&ctx, Channel::Email).unwrap().len(),
            1
        );
        assert_eq!(
            catalog.profiles_by_media_channel_name(&ctx, "EMAIL").unwrap().len(),
            1
        );
        assert!(matches!(
            catalog.profiles_by_media_channel_name(&ctx, "carrier_pigeon"),
            Err(CairnError::Catalog(CatalogError::UnknownChannel(_)))
        ));
        assert_eq!(
            catalog.profiles_by_behavioral_event(&ctx, "VIEW_STOCK").unwrap().len(),
            1
        );
        assert_eq!(catalog.profiles_by_job_title(&ctx, "Analyst").unwrap().len(), 1);
        assert_eq!(
            catalog.profiles_by_affinity(&ctx, "AAPL", 0.8).unwrap().len(),
            1
        );
        assert!(catalog.profiles_by_affinity(&ctx, "AAPL", 0.9).unwrap().is_empty());
    }

    #[test]
    fn test_consent_read_denies_by_default() {
        let (_registry, catalog, ctx) = setup();
        let tenant_id = ctx.tenant_id().unwrap();
        catalog
            .upsert_profile(&ctx, Profile::new(tenant_id, "p_01"))
            .unwrap();

        assert!(!catalog.consent_allows(&ctx, "p_01", Channel::Email).unwrap());
        catalog
            .set_consent(&ctx, "p_01", Channel::Email, ConsentState::Granted)
            .unwrap();
        assert!(catalog.consent_allows(&ctx, "p_01", Channel::Email).unwrap());
        catalog
            .set_consent(&ctx, "p_01", Channel::Email, ConsentState::Revoked)
            .unwrap();
        assert!(!catalog.consent_allows(&ctx, "p_01", Channel::Email).unwrap());
        // Unknown profile: deny, not error.
        assert!(!catalog.consent_allows(&ctx, "p_unknown", Channel::Email).unwrap());
    }

    #[test]
    fn test_create_event_duplicate_identity() {
        let (_registry, catalog, ctx) = setup();
        let tenant_id = ctx.tenant_id().unwrap();
        let campaign = catalog.create_campaign(&ctx, "Q2 push").unwrap();
        let event = MarketingEvent::new(
            tenant_id,
            campaign.campaign_id,
            "Spring Sale",
            "promo",
            Channel::Email,
            "20% off",
        );
        catalog.create_event(&ctx, event.clone()).unwrap();
        let result = catalog.create_event(&ctx, event);
        assert!(matches!(
            result,
            Err(CairnError::Catalog(CatalogError::DuplicateIdentity { .. }))
        ));
    }

    #[test]
    fn test_create_event_rejects_foreign_tenant() {
        let (_registry, catalog, ctx) = setup();
        let event = MarketingEvent::new(
            uuid::Uuid::now_v7(), // not the bound tenant
            uuid::Uuid::now_v7(),
            "Spring Sale",
            "promo",
            Channel::Email,
            "20% off",
        );
        let result = catalog.create_event(&ctx, event);
        assert!(matches!(
            result,
            Err(CairnError::Isolation(IsolationError::TenantMismatch { .. }))
        ));
    }

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<EventKey>>,
    }

    impl CatalogObserver for RecordingObserver {
        fn embeddable_content_changed(&self, _tenant_id: TenantId, event_key: EventKey) {
            self.seen.lock().unwrap().push(event_key);
        }
    }

    #[test]
    fn test_observer_fires_on_insert_and_content_update() {
        let (_registry, catalog, ctx) = setup();
        let tenant_id = ctx.tenant_id().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        catalog.register_observer(observer.clone()).unwrap();

        let campaign = catalog.create_campaign(&ctx, "Q2 push").unwrap();
        let event = catalog
            .create_event(
                &ctx,
                MarketingEvent::new(
                    tenant_id,
                    campaign.campaign_id,
                    "Spring Sale",
                    "promo",
                    Channel::Email,
                    "20% off",
                ),
            )
            .unwrap();
        assert_eq!(observer.seen.lock().unwrap().len(), 1);

        // Content edit fires again and resets embedding status.
        catalog
            .update_event_content(&ctx, event.event_key, None, None, Some("30% off"))
            .unwrap();
        assert_eq!(observer.seen.lock().unwrap().len(), 2);
        let stored = catalog.get_event(&ctx, event.event_key).unwrap().unwrap();
        assert_eq!(stored.embedding_status, EmbeddingStatus::Pending);
        assert_eq!(stored.message, "30% off");
        // Identity unchanged by the edit.
        assert_eq!(stored.event_key, event.event_key);
    }

    #[test]
    fn test_no_op_update_does_not_fire_observer() {
        let (_registry, catalog, ctx) = setup();
        let tenant_id = ctx.tenant_id().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        catalog.register_observer(observer.clone()).unwrap();

        let campaign = catalog.create_campaign(&ctx, "Q2 push").unwrap();
        let event = catalog
            .create_event(
                &ctx,
                MarketingEvent::new(
                    tenant_id,
                    campaign.campaign_id,
                    "Spring Sale",
                    "promo",
                    Channel::Email,
                    "20% off",
                ),
            )
            .unwrap();
        observer.seen.lock().unwrap().clear();

        // Same message again: embeddable content unchanged.
        catalog
            .update_event_content(&ctx, event.event_key, None, None, Some("20% off"))
            .unwrap();
        assert!(observer.seen.lock().unwrap().is_empty());
    }
}
