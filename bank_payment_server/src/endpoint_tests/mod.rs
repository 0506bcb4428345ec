mod helpers;
mod realtime;
mod webhooks;
